//! Escaping for composite key components.
//!
//! The key separator is the two-byte sequence `::`. To keep a raw field's
//! bytes from ever producing that sequence, every `\` is doubled and every
//! `:` is prefixed with `\`. Because an escaped `:` is always immediately
//! preceded by `\`, two adjacent raw `:` bytes can only ever be the `::`
//! separator itself — never part of escaped field data.

const BACKSLASH: u8 = b'\\';
const COLON: u8 = b':';

/// Doubles every `\` and escapes every `:` as `\:`.
pub fn escape(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for &b in input {
        match b {
            BACKSLASH => {
                out.push(BACKSLASH);
                out.push(BACKSLASH);
            }
            COLON => {
                out.push(BACKSLASH);
                out.push(COLON);
            }
            _ => out.push(b),
        }
    }
    out
}

/// Inverse of [`escape`]. Returns `None` if `input` is not validly escaped
/// (a trailing lone `\`, or a `\` followed by a byte other than `\` or `:`).
pub fn unescape(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == BACKSLASH {
            let next = *input.get(i + 1)?;
            match next {
                BACKSLASH => out.push(BACKSLASH),
                COLON => out.push(COLON),
                _ => return None,
            }
            i += 2;
        } else {
            out.push(b);
            i += 1;
        }
    }
    Some(out)
}

/// Splits an escaped, `::`-joined composite key into its raw (still-escaped)
/// segments. A `::` separator can only occur between segments, never inside
/// escaped field data (see module docs), so a byte-level scan that skips over
/// `\`-escaped pairs atomically is sufficient and exact.
pub fn split_segments(input: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < input.len() {
        if input[i] == BACKSLASH {
            // Escaped pair: not a separator candidate, skip atomically.
            i += 2;
            continue;
        }
        if input[i] == COLON && input.get(i + 1) == Some(&COLON) {
            segments.push(&input[start..i]);
            i += 2;
            start = i;
            continue;
        }
        i += 1;
    }
    segments.push(&input[start..]);
    segments
}
