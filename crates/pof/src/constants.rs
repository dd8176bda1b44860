//! POF wire constants.
//!
//! Type identifiers and compact value tags are negative packed integers;
//! non-negative identifiers name user types registered in a
//! [`PofContext`](crate::PofContext).

// Intrinsic type identifiers
pub const T_INT16: i32 = -1;
pub const T_INT32: i32 = -2;
pub const T_INT64: i32 = -3;
pub const T_INT128: i32 = -4;
pub const T_FLOAT32: i32 = -5;
pub const T_FLOAT64: i32 = -6;
pub const T_FLOAT128: i32 = -7;
pub const T_DECIMAL32: i32 = -8;
pub const T_DECIMAL64: i32 = -9;
pub const T_DECIMAL128: i32 = -10;
pub const T_BOOLEAN: i32 = -11;
pub const T_OCTET: i32 = -12;
pub const T_OCTET_STRING: i32 = -13;
pub const T_CHAR: i32 = -14;
pub const T_CHAR_STRING: i32 = -15;
pub const T_DATE: i32 = -16;
pub const T_YEAR_MONTH_INTERVAL: i32 = -17;
pub const T_TIME: i32 = -18;
pub const T_TIME_INTERVAL: i32 = -19;
pub const T_DATETIME: i32 = -20;
pub const T_DAY_TIME_INTERVAL: i32 = -21;
pub const T_COLLECTION: i32 = -22;
pub const T_UNIFORM_COLLECTION: i32 = -23;
pub const T_ARRAY: i32 = -24;
pub const T_UNIFORM_ARRAY: i32 = -25;
pub const T_SPARSE_ARRAY: i32 = -26;
pub const T_UNIFORM_SPARSE_ARRAY: i32 = -27;
pub const T_MAP: i32 = -28;
pub const T_UNIFORM_KEYS_MAP: i32 = -29;
pub const T_UNIFORM_MAP: i32 = -30;
pub const T_IDENTITY: i32 = -31;
pub const T_REFERENCE: i32 = -32;
pub const T_UNKNOWN: i32 = -65;

// Compact values (the tag is the whole encoding)
pub const V_BOOLEAN_FALSE: i32 = -33;
pub const V_BOOLEAN_TRUE: i32 = -34;
pub const V_STRING_ZERO_LENGTH: i32 = -35;
pub const V_COLLECTION_EMPTY: i32 = -36;
pub const V_REFERENCE_NULL: i32 = -37;
pub const V_FP_POS_INFINITY: i32 = -38;
pub const V_FP_NEG_INFINITY: i32 = -39;
pub const V_FP_NAN: i32 = -40;
pub const V_INT_NEG_1: i32 = -41;
pub const V_INT_0: i32 = -42;
pub const V_INT_22: i32 = -64;

/// Terminator of sparse arrays and user type property streams.
pub const PROP_TERMINATOR: i32 = -1;

// Stream wrapper markers (first byte of a serialized buffer)
pub const FMT_IDO: u8 = 13;
pub const FMT_BIN_DECO: u8 = 18;
pub const FMT_BIN_EXT_DECO: u8 = 19;
pub const FMT_EXT: u8 = 21;

/// Decoration slot holding the value itself.
pub const DECO_VALUE: u32 = 0;
/// Highest decoration slot a mask can address.
pub const DECO_MAX: u32 = 63;

/// Returns `true` for tags in the `V_INT_NEG_1..=V_INT_22` range.
#[inline]
pub fn is_tiny_int(tag: i32) -> bool {
    (V_INT_22..=V_INT_NEG_1).contains(&tag)
}

/// Decodes a tiny int tag into its value.
#[inline]
pub fn decode_tiny_int(tag: i32) -> i32 {
    V_INT_0 - tag
}

/// Encodes `n` as a tiny int tag when it falls in `-1..=22`.
#[inline]
pub fn encode_tiny_int(n: i64) -> Option<i32> {
    if (-1..=22).contains(&n) {
        Some(V_INT_0 - n as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_int_range() {
        assert_eq!(encode_tiny_int(-1), Some(V_INT_NEG_1));
        assert_eq!(encode_tiny_int(22), Some(V_INT_22));
        assert_eq!(encode_tiny_int(23), None);
        assert_eq!(decode_tiny_int(V_INT_0), 0);
        assert_eq!(decode_tiny_int(-52), 10);
        assert!(is_tiny_int(V_INT_NEG_1));
        assert!(!is_tiny_int(V_FP_NAN));
    }
}
