//! Whitespace-flexible substring search.
//!
//! Used to recognize HTML tags such as `< br / >` however the author spaced
//! them. Wherever the template has a whitespace run of length `n`, the
//! haystack may have any amount of whitespace as long as it has at least
//! `n - 1` characters of it. So one template blank permits zero blanks and two
//! template blanks require one.

/// Whitespace used when the caller does not supply a set.
pub const DEFAULT_WHITESPACE: &str = " \t\n\r\x0c\x0b";

/// Location of a flexible match, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlexMatch {
    pub start: usize,
    /// Matched length in the haystack, which may differ from the template.
    pub len: usize,
}

impl FlexMatch {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

struct WhiteSet {
    bytes: Vec<u8>,
    ignore_case: bool,
}

impl WhiteSet {
    /// An `i` or `I` in the set requests case-insensitive matching and is not
    /// itself whitespace. Only ASCII members are honored.
    fn parse(white: Option<&str>) -> Self {
        let raw = white.unwrap_or("");
        let ignore_case = raw.contains(['i', 'I']);
        let mut bytes: Vec<u8> = raw
            .bytes()
            .filter(|b| b.is_ascii() && *b != b'i' && *b != b'I')
            .collect();
        if bytes.is_empty() {
            bytes = DEFAULT_WHITESPACE.as_bytes().to_vec();
        }
        Self { bytes, ignore_case }
    }

    fn contains(&self, b: u8) -> bool {
        self.bytes.contains(&b)
    }

    fn run_len(&self, s: &[u8]) -> usize {
        s.iter().take_while(|b| self.contains(**b)).count()
    }

    fn word_len(&self, s: &[u8]) -> usize {
        s.iter().take_while(|b| !self.contains(**b)).count()
    }
}

/// Finds the first occurrence of `template` in `haystack` under flexible
/// whitespace rules.
///
/// `white` lists the whitespace characters (default [`DEFAULT_WHITESPACE`]);
/// include `i` for a case-insensitive search.
///
/// Whitespace before the first template word is not part of the match unless
/// required, but whitespace between template words is counted in the length.
/// The start of the haystack counts as preceded by enough whitespace.
///
/// # Examples
///
/// ```
/// use ferrotex_directive::flexmatch::find_flexible;
///
/// let m = find_flexible("ab   c   d", "  c d", None).unwrap();
/// assert_eq!((m.start, m.len), (5, 5));
/// ```
pub fn find_flexible(haystack: &str, template: &str, white: Option<&str>) -> Option<FlexMatch> {
    if template.is_empty() {
        return None;
    }
    let white = WhiteSet::parse(white);
    let hay = haystack.as_bytes();
    let tpl = template.as_bytes();

    haystack
        .char_indices()
        .find_map(|(start, _)| match_at(hay, tpl, start, &white))
}

fn match_at(hay: &[u8], tpl: &[u8], start: usize, white: &WhiteSet) -> Option<FlexMatch> {
    let mut p = start;
    let mut t = 0;
    let mut leading = 0;

    while t < tpl.len() {
        if p >= hay.len() {
            return None;
        }
        let sub_white = white.run_len(&tpl[t..]);
        let str_white = white.run_len(&hay[p..]);
        let min_white = sub_white.saturating_sub(1);

        if p != 0 && str_white < min_white {
            return None;
        }
        if p == start {
            leading = str_white;
        }
        if t != 0 && str_white > 0 && sub_white == 0 {
            return None;
        }

        t += sub_white;
        p += str_white;

        let sub_chars = white.word_len(&tpl[t..]);
        let str_chars = white.word_len(&hay[p..]);
        if str_chars < sub_chars {
            return None;
        }
        let want = &tpl[t..t + sub_chars];
        let got = &hay[p..p + sub_chars];
        let same = if white.ignore_case {
            want.eq_ignore_ascii_case(got)
        } else {
            want == got
        };
        if !same {
            return None;
        }
        t += sub_chars;
        p += sub_chars;
    }

    let found = start + leading;
    Some(FlexMatch {
        start: found,
        len: p - found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_blank_allows_no_whitespace() {
        let m = find_flexible("abcdef", "c d", None).unwrap();
        assert_eq!((m.start, m.len), (2, 2));
    }

    #[test]
    fn test_embedded_whitespace_counts_toward_length() {
        let m = find_flexible("abc  def", "c d", None).unwrap();
        assert_eq!((m.start, m.len), (2, 4));
    }

    #[test]
    fn test_double_blank_requires_whitespace() {
        assert!(find_flexible("abcdef", "c  d", None).is_none());
        let m = find_flexible("abc def", "c  d", None).unwrap();
        assert_eq!((m.start, m.len), (2, 3));
    }

    #[test]
    fn test_string_start_counts_as_whitespace() {
        let m = find_flexible("c   d", "  c d", None).unwrap();
        assert_eq!((m.start, m.len), (0, 5));
    }

    #[test]
    fn test_mandatory_leading_whitespace_is_not_counted() {
        let m = find_flexible("ab   c   d", "  c d", None).unwrap();
        assert_eq!((m.start, m.len), (5, 5));
        assert!(find_flexible("abc d", "  c d", None).is_none());
    }

    #[test]
    fn test_case_insensitive_flag() {
        assert!(find_flexible("x<BR>y", "< br >", None).is_none());
        let m = find_flexible("x<BR>y", "< br >", Some("i")).unwrap();
        assert_eq!((m.start, m.len), (1, 4));
    }

    #[test]
    fn test_spaced_tag() {
        let m = find_flexible("a < br / > b", "< br / >", Some("i")).unwrap();
        assert_eq!((m.start, m.len), (2, 8));
    }

    #[test]
    fn test_custom_whitespace_set() {
        let m = find_flexible("a--b", "a-b", Some("-")).unwrap();
        assert_eq!((m.start, m.len), (0, 4));
    }

    #[test]
    fn test_no_match_and_degenerate_inputs() {
        assert!(find_flexible("abc", "x", None).is_none());
        assert!(find_flexible("", "x", None).is_none());
        assert!(find_flexible("abc", "", None).is_none());
    }

    #[test]
    fn test_non_ascii_haystack() {
        let m = find_flexible("é < p > é", "< p >", Some("i")).unwrap();
        assert_eq!(&"é < p > é"[m.start..m.end()], "< p >");
    }
}
