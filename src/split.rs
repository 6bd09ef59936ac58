//! Header/body boundary detection

/// A raw message cut at its header/body boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sections<'a> {
    /// Everything before the blank line; empty when no boundary was found
    pub header: &'a str,

    /// Everything after the blank line, trailing line terminators removed.
    /// The whole input when no boundary was found.
    pub body: &'a str,

    /// Whether a blank-line boundary with content after it was found
    pub has_boundary: bool,
}

/// Split a raw message at the first blank line that has content after it.
///
/// A blank line is a `\n` or `\r\n` terminator directly followed by another
/// one. The body then runs to the end of input. A blank line that only has
/// terminators after it does not count, so `"a\n\n"` has no boundary.
/// The leftmost qualifying blank line wins, so paragraph breaks inside the
/// body never move the boundary.
#[must_use]
pub fn split(raw: &str) -> Sections<'_> {
    let bytes = raw.as_bytes();

    for start in 0..bytes.len() {
        if let Some(end) = blank_line_at(bytes, start)
            && end < bytes.len()
        {
            return Sections {
                header: &raw[..start],
                body: raw[end..].trim_end_matches(['\r', '\n']),
                has_boundary: true,
            };
        }
    }

    Sections {
        header: "",
        body: raw,
        has_boundary: false,
    }
}

/// Match `\r?\n\r?\n` at `start`, returning the index just past it
fn blank_line_at(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    for _ in 0..2 {
        if bytes.get(i) == Some(&b'\r') {
            i += 1;
        }
        if bytes.get(i) != Some(&b'\n') {
            return None;
        }
        i += 1;
    }
    Some(i)
}
