//! Directive extraction.
//!
//! [`extract_directive`] is the primitive every other pass is built on. It
//! finds the next `\name`, reads its arguments according to a
//! [`DirectiveQuery`], and cuts the directive and its arguments out of the
//! text.
//!
//! ```text
//!   "a \usepackage[dvips]{color} b"
//!      ^ at                      ^ end of last argument
//!   ──► "a  b", args = ["color"], optional = ["dvips"]
//! ```

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scan::{self, span_until};
use crate::splice::{self, Case};

/// Longest argument kept, in bytes. Longer arguments are truncated.
pub const MAX_ARG_LEN: usize = 255;

/// Most optional `[arg]`s retained per directive. Further ones are consumed
/// and counted but not kept.
pub const MAX_OPTIONAL_ARGS: usize = 8;

/// How a single argument is terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgFormat {
    /// `{arg}` (or `[arg]` at the optional position), otherwise a single
    /// character. Code `0`.
    #[default]
    Latex,
    /// Letters only, after an optional leading backslash. Code `1`.
    Alpha,
    /// Everything up to the next `{`, as in `\def\foo#1{`. Code `2`.
    UntilBrace,
    /// Everything up to the next whitespace. Code `8`.
    UntilWhite,
}

/// An argument-format code that does not describe a valid format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unknown argument format digit {0} (expected 0, 1, 2 or 8)")]
    UnknownDigit(u32),
    #[error("argument format code {0} has more than 9 digits")]
    TooLong(u64),
}

impl ArgFormat {
    pub fn from_digit(digit: u32) -> Result<Self, FormatError> {
        match digit {
            0 => Ok(ArgFormat::Latex),
            1 => Ok(ArgFormat::Alpha),
            2 => Ok(ArgFormat::UntilBrace),
            8 => Ok(ArgFormat::UntilWhite),
            other => Err(FormatError::UnknownDigit(other)),
        }
    }

    /// Parses a decimal format code, one digit per argument.
    ///
    /// The most significant digit describes the first argument, so `20`
    /// means "first argument runs up to `{`, second is a LaTeX group".
    /// Arguments without a digit use [`ArgFormat::Latex`]; `0` yields an empty
    /// list.
    pub fn parse_code(code: u64) -> Result<Vec<ArgFormat>, FormatError> {
        if code == 0 {
            return Ok(Vec::new());
        }
        let digits = code.to_string();
        if digits.len() > 9 {
            return Err(FormatError::TooLong(code));
        }
        digits
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(ArgFormat::from_digit)
            .collect()
    }
}

/// Post-processing applied to each extracted argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    #[default]
    None,
    /// Truncate at the first character outside ` +-.0123456789`.
    Numeric,
}

/// Describes which directive to look for and how to read its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveQuery {
    name: String,
    nargs: usize,
    optional_at: Option<usize>,
    formats: Vec<ArgFormat>,
    case: Case,
    validity: Validity,
}

impl DirectiveQuery {
    /// A case-sensitive query for `name` followed by `nargs` arguments.
    pub fn new(name: impl Into<String>, nargs: usize) -> Self {
        Self {
            name: name.into(),
            nargs,
            optional_at: None,
            formats: Vec::new(),
            case: Case::Sensitive,
            validity: Validity::None,
        }
    }

    /// Builds a query from a signed argument count. A negative count means
    /// `|nargs|` arguments with optional `[arg]`s allowed before the first.
    pub fn from_count(name: impl Into<String>, nargs: i32) -> Self {
        let query = Self::new(name, nargs.unsigned_abs() as usize);
        if nargs < 0 { query.optional_at(0) } else { query }
    }

    /// Accepts optional `[arg]`s just before the argument with index `pos`.
    pub fn optional_at(mut self, pos: usize) -> Self {
        self.optional_at = Some(pos);
        self
    }

    pub fn formats(mut self, formats: Vec<ArgFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn case(mut self, case: Case) -> Self {
        self.case = case;
        self
    }

    pub fn numeric(mut self) -> Self {
        self.validity = Validity::Numeric;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nargs(&self) -> usize {
        self.nargs
    }

    pub fn optional_position(&self) -> Option<usize> {
        self.optional_at
    }

    /// Format of the required argument with index `karg`.
    pub fn format_of(&self, karg: usize) -> ArgFormat {
        self.formats.get(karg).copied().unwrap_or_default()
    }
}

/// A directive removed from the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Byte offset where the directive started. After removal this is the
    /// position of the first character that followed it.
    pub at: usize,
    /// Required arguments, trimmed, outer braces stripped.
    pub args: Vec<String>,
    /// Optional `[arg]`s, at most [`MAX_OPTIONAL_ARGS`].
    pub optional: Vec<String>,
    /// Number of optional `[arg]`s consumed, including any not retained.
    pub optional_count: usize,
}

/// Why a directive could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// The text ended before all required arguments were seen.
    MissingArgument,
    /// An argument group was opened but never closed.
    UnclosedGroup,
}

/// A directive was found but its arguments could not be read.
///
/// The text is left untouched. `start..end` covers the directive name and the
/// arguments read before the failure, and those arguments are reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("malformed {name} at byte {start}: {reason:?}")]
    Malformed {
        name: String,
        start: usize,
        end: usize,
        args: Vec<String>,
        optional: Vec<String>,
        optional_count: usize,
        reason: MalformedReason,
    },
}

/// Finds the first occurrence of the directive `name` at or after `from`.
///
/// If `name` ends in a letter, a match directly followed by another letter is
/// a longer directive and is skipped, so searching for `\s` never matches
/// `\sin`.
pub fn find_directive(text: &str, name: &str, case: Case, from: usize) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    let ends_alpha = name.as_bytes().last().is_some_and(u8::is_ascii_alphabetic);
    let mut pos = from;
    loop {
        let at = splice::find_from(text, name, pos, case)?;
        let after = at + name.len();
        if !ends_alpha || !text.as_bytes().get(after).is_some_and(u8::is_ascii_alphabetic) {
            return Some(at);
        }
        pos = after;
    }
}

/// Finds, reads and removes the first matching directive.
///
/// Returns `Ok(None)` when the directive does not occur, leaving the text
/// unchanged.
///
/// # Errors
///
/// [`ExtractError::Malformed`] when the directive is present but the text
/// ends before its arguments do, or an argument group is never closed. The
/// text is not modified in that case.
///
/// # Examples
///
/// ```
/// use ferrotex_directive::directive::{extract_directive, DirectiveQuery};
///
/// let mut text = String::from(r"x \frac{a}{ b } y");
/// let found = extract_directive(&mut text, &DirectiveQuery::new(r"\frac", 2))
///     .unwrap()
///     .unwrap();
/// assert_eq!(found.args, ["a", "b"]);
/// assert_eq!(text, "x  y");
/// ```
pub fn extract_directive(
    text: &mut String,
    query: &DirectiveQuery,
) -> Result<Option<Extraction>, ExtractError> {
    extract_directive_from(text, query, 0)
}

/// Like [`extract_directive`], but ignores occurrences starting before byte
/// `from`.
pub fn extract_directive_from(
    text: &mut String,
    query: &DirectiveQuery,
    from: usize,
) -> Result<Option<Extraction>, ExtractError> {
    let Some(start) = find_directive(text, &query.name, query.case, from) else {
        return Ok(None);
    };

    let mut cursor = start + query.name.len();
    let mut args = Vec::new();
    let mut optional = Vec::new();
    let mut optional_count = 0;
    let mut iarg = 0;

    while iarg < query.nargs + optional_count {
        let karg = iarg - optional_count;
        let format = query.format_of(karg);
        let arg_start = scan::skip_white(text, cursor);

        let malformed = |reason| ExtractError::Malformed {
            name: query.name.clone(),
            start,
            end: cursor,
            args: args.clone(),
            optional: optional.clone(),
            optional_count,
            reason,
        };

        let Some(first) = text[arg_start..].chars().next() else {
            return Err(malformed(MalformedReason::MissingArgument));
        };
        let optional_here = query.optional_at.is_some_and(|pos| iarg == pos + optional_count);
        let is_group = first == '{' || (first == '[' && optional_here);

        let (raw, next) = match format {
            ArgFormat::Latex if is_group => {
                let rest = &text[arg_start..];
                let span = span_until(rest, "");
                if span.exhausted(rest) || span.stop == 0 {
                    return Err(malformed(MalformedReason::UnclosedGroup));
                }
                (&rest[1..span.stop], arg_start + span.stop + 1)
            }
            ArgFormat::Latex => {
                let next = arg_start + first.len_utf8();
                (&text[arg_start..next], next)
            }
            ArgFormat::Alpha | ArgFormat::UntilBrace | ArgFormat::UntilWhite => {
                let end = plain_tex_end(text, arg_start, format);
                (&text[arg_start..end], end)
            }
        };

        let mut field = scan::truncate_at_char(raw, MAX_ARG_LEN).trim().to_string();
        if query.validity == Validity::Numeric {
            let valid = field
                .find(|c: char| !" +-.0123456789".contains(c))
                .unwrap_or(field.len());
            field.truncate(valid);
        }

        if format == ArgFormat::Latex && is_group && first == '[' {
            if optional.len() < MAX_OPTIONAL_ARGS {
                optional.push(field);
            }
            optional_count += 1;
        } else {
            args.push(field);
        }
        iarg += 1;
        cursor = next;
    }

    debug!(
        "extracted {} with {} argument(s) at byte {}",
        query.name,
        args.len(),
        start
    );
    text.replace_range(start..cursor, "");

    Ok(Some(Extraction {
        at: start,
        args,
        optional,
        optional_count,
    }))
}

/// End of a plain-TeX style argument starting at `from`.
fn plain_tex_end(text: &str, from: usize, format: ArgFormat) -> usize {
    let bytes = text.as_bytes();
    let mut end = from;
    if bytes.get(end) == Some(&b'\\') {
        end += 1;
    }
    match format {
        ArgFormat::UntilBrace => match text[end..].find('{') {
            Some(brace) => end + brace,
            None => end + text[end..].chars().next().map_or(0, char::len_utf8),
        },
        ArgFormat::UntilWhite => {
            while end < bytes.len() && !scan::is_white(bytes[end]) {
                end += 1;
            }
            end
        }
        ArgFormat::Alpha | ArgFormat::Latex => {
            while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
                end += 1;
            }
            end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str, query: &DirectiveQuery) -> (String, Result<Option<Extraction>, ExtractError>) {
        let mut text = text.to_string();
        let result = extract_directive(&mut text, query);
        (text, result)
    }

    #[test]
    fn test_not_found_leaves_text() {
        let (text, result) = extract(r"a \b{c}", &DirectiveQuery::new(r"\eval", 1));
        assert_eq!(result, Ok(None));
        assert_eq!(text, r"a \b{c}");
    }

    #[test]
    fn test_prefix_collision_is_skipped() {
        let (text, result) = extract(r"\sin x \s{y}", &DirectiveQuery::new(r"\s", 1));
        let found = result.unwrap().unwrap();
        assert_eq!(found.args, ["y"]);
        assert_eq!(found.at, 7);
        assert_eq!(text, r"\sin x ");
    }

    #[test]
    fn test_non_alpha_name_matches_anywhere() {
        let (text, result) = extract("a^^b", &DirectiveQuery::new("^^", 0));
        assert_eq!(result.unwrap().unwrap().at, 1);
        assert_eq!(text, "ab");
    }

    #[test]
    fn test_nested_group_argument() {
        let (text, result) = extract(r"\eval{ (1+{2}) }!", &DirectiveQuery::new(r"\eval", 1));
        assert_eq!(result.unwrap().unwrap().args, ["(1+{2})"]);
        assert_eq!(text, "!");
    }

    #[test]
    fn test_single_character_argument() {
        let (text, result) = extract(r"\input foo", &DirectiveQuery::new(r"\input", 1));
        assert_eq!(result.unwrap().unwrap().args, ["f"]);
        assert_eq!(text, "oo");
    }

    #[test]
    fn test_optional_argument_goes_to_side_list() {
        let query = DirectiveQuery::from_count(r"\usepackage", -1);
        let (text, result) = extract(r"\usepackage [active, tightpage] {preview}x", &query);
        let found = result.unwrap().unwrap();
        assert_eq!(found.args, ["preview"]);
        assert_eq!(found.optional, ["active, tightpage"]);
        assert_eq!(found.optional_count, 1);
        assert_eq!(text, "x");
    }

    #[test]
    fn test_bracket_outside_optional_position_is_single_char() {
        let (text, result) = extract(r"\eval[1]", &DirectiveQuery::new(r"\eval", 1));
        assert_eq!(result.unwrap().unwrap().args, ["["]);
        assert_eq!(text, "1]");
    }

    #[test]
    fn test_optional_in_the_middle() {
        let query = DirectiveQuery::new(r"\newcommand", 2).optional_at(1);
        let (text, result) = extract(r"\newcommand{\foo}[1]{#1!}", &query);
        let found = result.unwrap().unwrap();
        assert_eq!(found.args, [r"\foo", "#1!"]);
        assert_eq!(found.optional, ["1"]);
        assert!(text.is_empty());
    }

    #[test]
    fn test_plain_tex_formats() {
        let query = DirectiveQuery::new(r"\def", 2).formats(ArgFormat::parse_code(20).unwrap());
        let (text, result) = extract(r"\def\foo#1{bar #1} z", &query);
        assert_eq!(result.unwrap().unwrap().args, [r"\foo#1", "bar #1"]);
        assert_eq!(text, " z");

        let query = DirectiveQuery::new(r"\let", 1).formats(vec![ArgFormat::Alpha]);
        let (text, _) = extract(r"\let\abc=d", &query);
        assert_eq!(text, "=d");

        let query = DirectiveQuery::new(r"\x", 1).formats(vec![ArgFormat::UntilWhite]);
        let (text, result) = extract(r"\x a=b c", &query);
        assert_eq!(result.unwrap().unwrap().args, ["a=b"]);
        assert_eq!(text, " c");
    }

    #[test]
    fn test_numeric_validity_truncates() {
        let query = DirectiveQuery::new(r"\density", 1).numeric();
        let (text, result) = extract(r"\density{ 150dpi }", &query);
        assert_eq!(result.unwrap().unwrap().args, ["150"]);
        assert!(text.is_empty());
    }

    #[test]
    fn test_case_insensitive_search() {
        let query = DirectiveQuery::new(r"\eval", 1).case(Case::Insensitive);
        let (text, result) = extract(r"a\EVAL{2}", &query);
        assert_eq!(result.unwrap().unwrap().args, ["2"]);
        assert_eq!(text, "a");
    }

    #[test]
    fn test_missing_argument_is_malformed_and_text_untouched() {
        let (text, result) = extract(r"x \frac{a}  ", &DirectiveQuery::new(r"\frac", 2));
        match result {
            Err(ExtractError::Malformed { start, end, args, reason, .. }) => {
                assert_eq!((start, end), (2, 10));
                assert_eq!(args, ["a"]);
                assert_eq!(reason, MalformedReason::MissingArgument);
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
        assert_eq!(text, r"x \frac{a}  ");
    }

    #[test]
    fn test_unclosed_group_is_malformed() {
        let (text, result) = extract(r"\input{a{b}", &DirectiveQuery::new(r"\input", 1));
        match result {
            Err(ExtractError::Malformed { start, end, reason, .. }) => {
                assert_eq!((start, end), (0, 6));
                assert_eq!(reason, MalformedReason::UnclosedGroup);
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
        assert_eq!(text, r"\input{a{b}");
    }

    #[test]
    fn test_long_argument_is_truncated() {
        let long = "x".repeat(300);
        let (_, result) = extract(&format!(r"\eval{{{long}}}"), &DirectiveQuery::new(r"\eval", 1));
        assert_eq!(result.unwrap().unwrap().args[0].len(), MAX_ARG_LEN);
    }

    #[test]
    fn test_extract_from_offset() {
        let mut text = String::from(r"\q{1} \q{2}");
        let found = extract_directive_from(&mut text, &DirectiveQuery::new(r"\q", 1), 1)
            .unwrap()
            .unwrap();
        assert_eq!(found.args, ["2"]);
        assert_eq!(text, r"\q{1} ");
    }

    #[test]
    fn test_parse_code() {
        assert!(ArgFormat::parse_code(0).unwrap().is_empty());
        assert_eq!(
            ArgFormat::parse_code(20).unwrap(),
            vec![ArgFormat::UntilBrace, ArgFormat::Latex]
        );
        assert_eq!(
            ArgFormat::parse_code(81).unwrap(),
            vec![ArgFormat::UntilWhite, ArgFormat::Alpha]
        );
        assert_eq!(ArgFormat::parse_code(3), Err(FormatError::UnknownDigit(3)));
        assert!(matches!(ArgFormat::parse_code(1_000_000_000), Err(FormatError::TooLong(_))));
    }
}
