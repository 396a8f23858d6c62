//! Delimiter-aware scanning over directive text.
//!
//! Two scanners live here. [`span_until`] walks a string while tracking
//! `()[]{}` nesting and stops at the first "reject" character found outside
//! every group. [`quote_span`] finds the closing quote of a `"`/`'` token.
//! The directive extractor uses the first to find the end of `{arg}` groups,
//! the expression evaluator uses it to find top-level operators.

/// The result of a [`span_until`] scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    /// Everything scanned before the stop, trimmed of surrounding whitespace.
    ///
    /// When the reject set is empty the closing delimiter is part of the
    /// segment.
    pub segment: &'a str,
    /// Byte offset of the stopping character, or the length of the input when
    /// no stop condition was met.
    pub stop: usize,
}

impl Span<'_> {
    /// Returns `true` if the scan ran off the end of the input.
    pub fn exhausted(&self, input: &str) -> bool {
        self.stop >= input.len()
    }
}

/// Which escaped quotes [`quote_span`] rewrites in the returned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unescape {
    /// Copy every escape sequence verbatim.
    #[default]
    None,
    /// Turn `\"` into `"` inside a `"` token (or `\'` inside a `'` token).
    Matching,
    /// Turn both `\"` and `\'` into bare quotes.
    Both,
}

/// A quoted token located by [`quote_span`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSpan {
    /// Byte offset of the opening quote.
    pub start: usize,
    /// Byte offset of the closing quote, or the input length if unterminated.
    pub end: usize,
    /// Whether a closing quote was found.
    pub closed: bool,
    /// The token including its outer quotes, with escapes rewritten per
    /// [`Unescape`].
    pub token: String,
}

const OPENERS: &[char] = &['(', '[', '{'];
const CLOSERS: &[char] = &[')', ']', '}'];
const QUOTES: &[char] = &['"', '\''];

/// Scans `s` for the first character of `reject` that lies outside every
/// `()`, `[]` and `{}` group.
///
/// A bracket preceded by an unescaped backslash does not change the nesting
/// depth. Nesting is counted, not validated, so `(..]` closes a group.
///
/// If `reject` contains `"` or `'`, those characters are not stops; instead
/// quoted substrings are skipped as a unit so rejects inside them are ignored.
///
/// An empty `reject` set finds the closer that balances a leading opener:
/// `span_until("{a{b}c}d", "")` stops at the `}` before `d`.
///
/// # Examples
///
/// ```
/// use ferrotex_directive::scan::span_until;
///
/// let span = span_until("abc(---)def+++", "+-");
/// assert_eq!(span.segment, "abc(---)def");
/// assert_eq!(span.stop, 11);
/// ```
pub fn span_until<'a>(s: &'a str, reject: &str) -> Span<'a> {
    let span_quotes = reject.contains(QUOTES);
    let rejects: Vec<char> = reject.chars().filter(|c| !QUOTES.contains(c)).collect();

    let mut depth: i32 = 0;
    let mut escaped = false;
    let mut stop = s.len();
    let mut pos = 0;

    while pos < s.len() {
        let Some(c) = s[pos..].chars().next() else {
            break;
        };
        let mut step = c.len_utf8();

        if !escaped {
            if OPENERS.contains(&c) {
                depth += 1;
            } else if CLOSERS.contains(&c) {
                depth -= 1;
            }
        }

        if depth < 1 {
            if span_quotes && QUOTES.contains(&c) {
                if let Some(quoted) = quote_span(&s[pos..], Unescape::None) {
                    if quoted.closed && quoted.start == 0 {
                        step = quoted.end + 1;
                    }
                }
            }
            if rejects.is_empty() || rejects.contains(&c) {
                stop = pos;
                break;
            }
        }

        escaped = step == 1 && c == '\\' && !escaped;
        pos += step;
    }

    let segment_end = if rejects.is_empty() && stop < s.len() {
        // Closer belongs to the segment.
        stop + s[stop..].chars().next().map_or(0, char::len_utf8)
    } else {
        stop
    };

    Span {
        segment: s[..segment_end].trim(),
        stop,
    }
}

/// Finds the closing quote of a token that begins (after optional leading
/// whitespace) with `"` or `'`.
///
/// Returns `None` if the text does not begin with a quote. An unterminated
/// token spans to the end of the input with `closed` set to `false`.
///
/// Backslash escapes are resolved one character at a time: an escape stays
/// armed across a run of backslashes, so in `"a\\"b"` the middle quote is
/// still treated as escaped and the token is `"a\"b"`.
pub fn quote_span(s: &str, unescape: Unescape) -> Option<QuoteSpan> {
    let start = s.len() - s.trim_start().len();
    let quote = s[start..].chars().next().filter(|c| QUOTES.contains(c))?;

    let mut token = String::with_capacity(s.len() - start);
    token.push(quote);
    let mut escaped = false;

    for (offset, c) in s[start + 1..].char_indices() {
        let at = start + 1 + offset;
        if escaped {
            if c != '\\' {
                escaped = false;
            }
            let keep_backslash = match unescape {
                Unescape::None => true,
                Unescape::Matching => c != quote,
                Unescape::Both => !QUOTES.contains(&c),
            };
            if keep_backslash {
                token.push('\\');
            }
            if !escaped {
                token.push(c);
            }
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if c == quote {
            token.push(quote);
            return Some(QuoteSpan {
                start,
                end: at,
                closed: true,
                token,
            });
        }
        token.push(c);
    }

    Some(QuoteSpan {
        start,
        end: s.len(),
        closed: false,
        token,
    })
}

/// Skips ASCII whitespace starting at byte `from` and returns the new offset.
pub(crate) fn skip_white(s: &str, from: usize) -> usize {
    let bytes = s.as_bytes();
    let mut at = from.min(bytes.len());
    while at < bytes.len() && is_white(bytes[at]) {
        at += 1;
    }
    at
}

/// Whitespace as the directive grammar sees it: blank, tab, newline, carriage
/// return, form feed, vertical tab.
pub(crate) fn is_white(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\x0b')
}

/// Truncates `s` to at most `max` bytes without splitting a character.
pub(crate) fn truncate_at_char(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_stops_outside_parens() {
        let span = span_until("abc(---)def+++", "+-");
        assert_eq!(span.segment, "abc(---)def");
        assert_eq!(span.stop, 11);
    }

    #[test]
    fn test_span_without_stop_returns_whole_string() {
        let input = "  (a+b)  ";
        let span = span_until(input, "+");
        assert_eq!(span.segment, "(a+b)");
        assert!(span.exhausted(input));
    }

    #[test]
    fn test_span_empty_reject_finds_matching_closer() {
        let input = "{a{b}c}d";
        let span = span_until(input, "");
        assert_eq!(span.stop, 6);
        assert_eq!(span.segment, "{a{b}c}");
    }

    #[test]
    fn test_span_tolerates_mismatched_nesting() {
        let span = span_until("(x]+y", "+");
        assert_eq!(span.stop, 3);
        assert_eq!(span.segment, "(x]");
    }

    #[test]
    fn test_span_ignores_escaped_brackets() {
        // \{ does not open a group, so the + is at depth 0.
        let span = span_until(r"a\{b+c", "+");
        assert_eq!(span.segment, r"a\{b");
        assert_eq!(span.stop, 4);
    }

    #[test]
    fn test_span_double_backslash_does_not_escape() {
        // \\ is an escaped backslash, so the following { opens a group.
        let span = span_until(r"\\{a+b}+c", "+");
        assert_eq!(span.segment, r"\\{a+b}");
    }

    #[test]
    fn test_span_skips_quoted_rejects() {
        let span = span_until(r#"say "a,b", c"#, r#",""#);
        assert_eq!(span.segment, r#"say "a,b""#);
        assert_eq!(span.stop, 9);
    }

    #[test]
    fn test_span_without_quote_flag_stops_inside_quotes() {
        let span = span_until(r#"say "a,b", c"#, ",");
        assert_eq!(span.stop, 6);
    }

    #[test]
    fn test_quote_span_finds_closer() {
        let q = quote_span(r#"  "abc" tail"#, Unescape::None).unwrap();
        assert_eq!(q.start, 2);
        assert_eq!(q.end, 6);
        assert!(q.closed);
        assert_eq!(q.token, r#""abc""#);
    }

    #[test]
    fn test_quote_span_not_quoted() {
        assert!(quote_span("abc", Unescape::None).is_none());
        assert!(quote_span("   ", Unescape::None).is_none());
    }

    #[test]
    fn test_quote_span_unterminated() {
        let q = quote_span("'abc", Unescape::None).unwrap();
        assert!(!q.closed);
        assert_eq!(q.end, 4);
    }

    #[test]
    fn test_quote_span_escaped_quote_does_not_close() {
        let q = quote_span(r#""a\"b" c"#, Unescape::None).unwrap();
        assert_eq!(q.end, 5);
        assert_eq!(q.token, r#""a\"b""#);
    }

    #[test]
    fn test_quote_span_unescape_matching() {
        let q = quote_span(r#""a\"b\'c""#, Unescape::Matching).unwrap();
        assert_eq!(q.token, r#""a"b\'c""#);
    }

    #[test]
    fn test_quote_span_unescape_both() {
        let q = quote_span(r#""a\"b\'c\n""#, Unescape::Both).unwrap();
        assert_eq!(q.token, r#""a"b'c\n""#);
    }

    #[test]
    fn test_quote_span_double_backslash_keeps_quote_escaped() {
        let q = quote_span(r#""a\\"b""#, Unescape::Matching).unwrap();
        assert_eq!(q.token, r#""a\"b""#);
        assert_eq!(q.end, 6);
    }

    #[test]
    fn test_truncate_at_char_respects_boundaries() {
        assert_eq!(truncate_at_char("héllo", 2), "h");
        assert_eq!(truncate_at_char("abc", 10), "abc");
    }
}
