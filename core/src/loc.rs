//! Line counting for blobs fetched from the repository tree.
//!
//! This is an approximation of "lines of code": every newline-terminated line
//! counts, blank lines and comments included. Blobs that look binary are not
//! counted at all.

/// Bytes inspected when sniffing for binary content, same window git uses.
const SNIFF_LEN: usize = 8000;

/// Blobs above this size are skipped without being downloaded.
pub const MAX_BLOB_BYTES: u64 = 10 * 1024 * 1024;

pub fn looks_binary(content: &[u8]) -> bool {
    content.iter().take(SNIFF_LEN).any(|&b| b == 0)
}

/// Number of lines in `content`, or `None` if it looks binary.
///
/// A final line without a trailing newline still counts.
pub fn count_lines(content: &[u8]) -> Option<u64> {
    if looks_binary(content) {
        return None;
    }
    let newlines = content.iter().filter(|&&b| b == b'\n').count() as u64;
    let unterminated = !content.is_empty() && !content.ends_with(b"\n");
    Some(newlines + u64::from(unterminated))
}
