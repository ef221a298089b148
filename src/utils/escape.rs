//! Escaping for whitespace-delimited replay data.
//!
//! Replay files are parsed by splitting lines on whitespace, so any token taken from the
//! target (method names in particular, which may be synthetic) must not contain spaces,
//! control characters or bytes that a line-oriented reader would mangle.

use std::fmt::Write;

/// Escapes a string for use as one token of a replay line.
///
/// Backslashes are doubled. Whitespace, control characters and everything outside
/// printable ASCII is written as `\uXXXX`, one escape per UTF-16 code unit.
///
/// # Examples
///
/// ```rust
/// use optoscope::utils::escape_replay;
///
/// assert_eq!(escape_replay("<init>"), "<init>");
/// assert_eq!(escape_replay("lambda$0 x"), "lambda$0\\u0020x");
/// assert_eq!(escape_replay("a\\b"), "a\\\\b");
/// ```
#[must_use]
pub fn escape_replay(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '!'..='~' => escaped.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    // Writing into a String cannot fail
                    let _ = write!(escaped, "\\u{unit:04x}");
                }
            }
        }
    }
    escaped
}
