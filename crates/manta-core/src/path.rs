//! Path encoding for the hierarchical namespace
//!
//! Paths are forward-slash separated; each segment is percent-encoded as
//! UTF-8 while the separator stays literal. Empty segments are elided.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::MantaResult;

/// Path separator.
pub const SEPARATOR: char = '/';

// Everything outside unreserved (RFC 3986) gets escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a raw object path segment by segment.
///
/// `/u/stor/a b` becomes `/u/stor/a%20b`. Empty segments are dropped, so
/// `/u//stor` and `/u/stor` encode identically.
pub fn format_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for segment in path.split(SEPARATOR) {
        if segment.is_empty() {
            continue;
        }
        encoded.push(SEPARATOR);
        encoded.push_str(&utf8_percent_encode(segment, SEGMENT).to_string());
    }
    encoded
}

/// Invert [`format_path`].
pub fn decode_path(path: &str) -> MantaResult<String> {
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| anyhow::anyhow!("path is not valid percent-encoded UTF-8: {e}"))?;
    Ok(decoded.into_owned())
}
