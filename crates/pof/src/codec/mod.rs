//! Whole-value encoding and decoding.
//!
//! The value tree only reaches for these when a node is read or written;
//! navigation itself goes through [`skip`].

pub mod decoder;
pub mod encoder;
pub mod skip;

pub use decoder::PofDecoder;
pub use encoder::PofEncoder;
pub use skip::{skip_uniform_value, skip_value};

use pof_buffers::Reader;

use crate::config::DEFAULT_MAX_DEPTH;
use crate::context::PofContext;
use crate::error::{PofError, Result};
use crate::value::Value;

/// Encodes `value` as a tagged POF value.
pub fn encode(value: &Value, ctx: &dyn PofContext) -> Result<Vec<u8>> {
    PofEncoder::new(ctx).encode(value)
}

/// Decodes one tagged POF value spanning all of `data`.
pub fn decode(data: &[u8], ctx: &dyn PofContext) -> Result<Value> {
    let mut decoder = PofDecoder::new(Reader::new(data), ctx, DEFAULT_MAX_DEPTH);
    let value = decoder.decode_value()?;
    if !decoder.reader.is_eof() {
        return Err(PofError::malformed(
            decoder.reader.x,
            format!("{} trailing bytes after value", decoder.reader.size()),
        ));
    }
    Ok(value)
}
