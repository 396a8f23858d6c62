//! In-place edits on the document text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from [`change`] and [`replace`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpliceError {
    #[error("splice range {start}..{end} is outside the text or splits a character")]
    OutOfRange { start: usize, end: usize },
    #[error("an empty pattern needs a replacement limit")]
    EmptyPattern,
}

/// Case sensitivity of a directive or pattern search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Case {
    #[default]
    Sensitive,
    /// ASCII letters compare without regard to case.
    Insensitive,
}

/// Replaces the `n` bytes starting at `at` with `to`, growing or shrinking the
/// text as needed.
pub fn change(text: &mut String, at: usize, n: usize, to: &str) -> Result<(), SpliceError> {
    let end = at.checked_add(n).ok_or(SpliceError::OutOfRange { start: at, end: usize::MAX })?;
    if end > text.len() || !text.is_char_boundary(at) || !text.is_char_boundary(end) {
        return Err(SpliceError::OutOfRange { start: at, end });
    }
    text.replace_range(at..end, to);
    Ok(())
}

/// Replaces occurrences of `from` with `to`, at most `max` of them (`0` means
/// all). Returns the number of replacements.
///
/// When `from` looks like a directive (a backslash followed by at least one
/// character), a match directly followed by an ASCII letter is the prefix of a
/// longer directive and is skipped: replacing `\png` leaves `\pngx` alone.
///
/// Searching resumes after the inserted text, so `to` may contain `from`.
///
/// # Errors
///
/// [`SpliceError::EmptyPattern`] if `from` is empty and `max` is `0`.
pub fn replace(
    text: &mut String,
    from: &str,
    to: &str,
    case: Case,
    max: usize,
) -> Result<usize, SpliceError> {
    if from.is_empty() && max == 0 {
        return Err(SpliceError::EmptyPattern);
    }
    let is_command = from.len() >= 2 && from.starts_with('\\');
    let mut pos = 0;
    let mut count = 0;

    while max == 0 || count < max {
        let at = if from.is_empty() {
            pos
        } else {
            match find_from(text, from, pos, case) {
                Some(at) => at,
                None => break,
            }
        };
        let after = at + from.len();
        if is_command && text.as_bytes().get(after).is_some_and(u8::is_ascii_alphabetic) {
            pos = after;
            continue;
        }
        change(text, at, from.len(), to)?;
        count += 1;
        pos = at + to.len();
        if pos >= text.len() {
            break;
        }
    }
    Ok(count)
}

/// Finds `pat` in `text` at or after byte `from`.
///
/// `from` is moved forward to the next character boundary if it falls inside
/// a character.
pub fn find_from(text: &str, pat: &str, from: usize, case: Case) -> Option<usize> {
    let mut from = from;
    while from < text.len() && !text.is_char_boundary(from) {
        from += 1;
    }
    if from > text.len() {
        return None;
    }
    match case {
        Case::Sensitive => text[from..].find(pat).map(|i| from + i),
        Case::Insensitive => {
            let needle = pat.as_bytes();
            let hay = text.as_bytes();
            if needle.is_empty() {
                return Some(from);
            }
            text[from..]
                .char_indices()
                .map(|(i, _)| from + i)
                .find(|&i| {
                    hay.len() - i >= needle.len() && hay[i..i + needle.len()].eq_ignore_ascii_case(needle)
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_grows_and_shrinks() {
        let mut s = String::from("12345678");
        change(&mut s, 3, 1, "ABC").unwrap();
        assert_eq!(s, "123ABC5678");
        change(&mut s, 0, 6, "").unwrap();
        assert_eq!(s, "5678");
    }

    #[test]
    fn test_change_rejects_bad_ranges() {
        let mut s = String::from("héllo");
        assert!(change(&mut s, 2, 1, "x").is_err());
        assert!(change(&mut s, 4, 10, "x").is_err());
        assert_eq!(s, "héllo");
    }

    #[test]
    fn test_replace_all() {
        let mut s = String::from("a~b~c");
        assert_eq!(replace(&mut s, "~", " ", Case::Sensitive, 0), Ok(2));
        assert_eq!(s, "a b c");
    }

    #[test]
    fn test_replace_limited() {
        let mut s = String::from("xxx");
        assert_eq!(replace(&mut s, "x", "y", Case::Sensitive, 2), Ok(2));
        assert_eq!(s, "yyx");
    }

    #[test]
    fn test_replace_skips_longer_directive() {
        let mut s = String::from(r"\pngx \png \png2");
        assert_eq!(replace(&mut s, r"\png", "", Case::Sensitive, 0), Ok(2));
        assert_eq!(s, r"\pngx  2");
    }

    #[test]
    fn test_replace_case_insensitive() {
        let mut s = String::from(r"a \QUIET b");
        assert_eq!(replace(&mut s, r"\quiet", "", Case::Insensitive, 0), Ok(1));
        assert_eq!(s, "a  b");
    }

    #[test]
    fn test_replace_when_replacement_contains_pattern() {
        let mut s = String::from("a_b");
        assert_eq!(replace(&mut s, "_", "__", Case::Sensitive, 0), Ok(1));
        assert_eq!(s, "a__b");
    }

    #[test]
    fn test_replace_empty_pattern() {
        let mut s = String::from("abc");
        assert_eq!(replace(&mut s, "", "x", Case::Sensitive, 0), Err(SpliceError::EmptyPattern));
        assert_eq!(replace(&mut s, "", "x", Case::Sensitive, 1), Ok(1));
        assert_eq!(s, "xabc");
    }

    #[test]
    fn test_find_from_insensitive_with_multibyte() {
        assert_eq!(find_from("é\\Eval{1}", "\\eval", 0, Case::Insensitive), Some(2));
        assert_eq!(find_from("é\\Eval{1}", "\\eval", 1, Case::Insensitive), Some(2));
        assert_eq!(find_from("é\\Eval{1}", "\\eval", 0, Case::Sensitive), None);
    }
}
