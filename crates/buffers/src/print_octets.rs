//! Hex rendering of byte runs for diagnostics.

use std::fmt::Write;

/// Formats at most `max` bytes of `octets` as space separated hex pairs,
/// noting how many bytes were left out.
///
/// Used when logging deltas and in debug output of parsed buffers.
///
/// # Example
///
/// ```
/// use pof_buffers::print_octets;
///
/// assert_eq!(print_octets(&[0x15, 0x41, 0x0a], 16), "15 41 0a");
/// assert_eq!(print_octets(&[1, 2, 3, 4], 2), "01 02 ... (2 more)");
/// assert_eq!(print_octets(&[], 16), "");
/// ```
pub fn print_octets(octets: &[u8], max: usize) -> String {
    let mut out = String::with_capacity(octets.len().min(max) * 3 + 16);
    for (i, byte) in octets.iter().take(max).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    if octets.len() > max {
        let _ = write!(out, " ... ({} more)", octets.len() - max);
    }
    out
}
