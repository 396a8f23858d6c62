//! Input normalization ahead of directive handling.
//!
//! Expressions usually arrive through a URL query string or an HTML page, so
//! they carry `%XX` escapes, HTML entities and stray tags. This module turns
//! them back into plain LaTeX and strips the outer math delimiters, noting
//! which math mode the delimiters asked for.

use log::debug;

use crate::context::MathMode;
use crate::flexmatch::find_flexible;

/// Control characters a URL decoder turns into blanks.
const CONTROL_CHARS: &[char] = &['\n', '\t', '\x0b', '\x08', '\r', '\x0c', '\x07'];

/// Named entities and their LaTeX replacements. Each may be followed by an
/// optional `;`.
const ENTITIES: &[(&str, &str)] = &[
    ("&quot", "\""),
    ("&amp", "&"),
    ("&lt", "<"),
    ("&gt", ">"),
    ("&backslash", "\\"),
    ("&nbsp", " "),
    ("&iexcl", "{\\mbox{!`}}"),
    ("&brvbar", "|"),
    ("&plusmn", "\\pm"),
    ("&sup2", "{{}^2}"),
    ("&sup3", "{{}^3}"),
    ("&micro", "\\mu"),
    ("&sup1", "{{}^1}"),
    ("&frac14", "{\\frac14}"),
    ("&frac12", "{\\frac12}"),
    ("&frac34", "{\\frac34}"),
    ("&iquest", "{\\mbox{?`}}"),
    ("&Acirc", "{\\rm\\hat A}"),
    ("&Atilde", "{\\rm\\tilde A}"),
    ("&Auml", "{\\rm\\ddot A}"),
    ("&Aring", "{\\overset{o}{\\rm A}}"),
    ("&atilde", "{\\rm\\tilde a}"),
    ("&yuml", "{\\rm\\ddot y}"),
];

/// `&#nnn` references with a known replacement. Others become a visible
/// marker.
const NUMERIC_ENTITIES: &[(u32, &str)] = &[
    (9, " "),
    (10, " "),
    (13, " "),
    (32, " "),
    (33, "!"),
    (34, "\""),
    (35, "#"),
    (36, "$"),
    (37, "%"),
    (38, "&"),
    (39, "'"),
    (40, ")"),
    (41, ")"),
    (42, "*"),
    (43, "+"),
    (44, ","),
    (45, "-"),
    (46, "."),
    (47, "/"),
    (58, ":"),
    (59, ";"),
    (60, "<"),
    (61, "="),
    (62, ">"),
    (63, "?"),
    (64, "@"),
    (91, "["),
    (92, "\\"),
    (93, "]"),
    (94, "^"),
    (95, "_"),
    (96, "`"),
    (123, "{"),
    (124, "|"),
    (125, "}"),
    (126, "~"),
    (160, "~"),
    (166, "|"),
    (173, "-"),
    (177, "{\\pm}"),
    (215, "{\\times}"),
];

/// Longest digit run read after `&#`.
const MAX_NUMERIC_DIGITS: usize = 11;

/// HTML tags, as flexible-whitespace templates, and their replacements.
const TAGS: &[(&str, &str)] = &[
    ("< br >", " "),
    ("< br / >", " "),
    ("< dd >", " "),
    ("< / dd >", " "),
    ("< dl >", " "),
    ("< / dl >", " "),
    ("< p >", " "),
    ("< / p >", " "),
    ("< tex >", ""),
    ("< / tex >", ""),
];

/// Decodes a URL-encoded expression.
///
/// Control characters become blanks, surrounding whitespace is trimmed, and
/// each `%XX` hex escape is replaced by the byte it encodes. Byte sequences
/// that are not valid UTF-8 after decoding are replaced with U+FFFD.
///
/// ```
/// use ferrotex_directive::entities::unescape_url;
///
/// assert_eq!(unescape_url("\tx%2By%3D2\n"), "x+y=2");
/// ```
pub fn unescape_url(url: &str) -> String {
    let blanked = url.replace(CONTROL_CHARS, " ");
    let bytes = blanked.trim().as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok());
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strips outer math delimiters and replaces HTML entities and tags.
///
/// Returns the math mode implied by the delimiters, if any: `$..$` selects
/// text mode, `$$..$$` or `\[..\]` display mode, `$$$..$$$` paragraph mode.
/// The text is trimmed afterwards.
///
/// An entity or tag directly preceded by a backslash is left alone, as is an
/// entity directly followed by a letter (`&ltx` is not `&lt`).
pub fn preprocess_entities(text: &mut String) -> Option<MathMode> {
    if text.is_empty() {
        return None;
    }
    let mode = strip_delimiters(text);

    for (html, latex) in ENTITIES {
        replace_entity(text, html, |_| (*latex).to_string());
    }
    replace_entity(text, "&#", numeric_entity);
    for (tag, latex) in TAGS {
        replace_tag(text, tag, latex);
    }

    let trimmed = text.trim();
    if trimmed.len() != text.len() {
        *text = trimmed.to_string();
    }
    debug!("preprocessed expression: {}", text);
    mode
}

fn strip_delimiters(text: &mut String) -> Option<MathMode> {
    let mut dollars = 0;
    while text.len() > 2 && text.starts_with('$') && text.ends_with('$') {
        text.pop();
        text.remove(0);
        dollars += 1;
    }
    match dollars {
        0 if text.len() > 4 && text.starts_with("\\[") && text.ends_with("\\]") => {
            text.truncate(text.len() - 2);
            text.replace_range(..2, "");
            Some(MathMode::Display)
        }
        1 => Some(MathMode::Text),
        2 => Some(MathMode::Display),
        3 => Some(MathMode::Paragraph),
        _ => None,
    }
}

fn numeric_entity(digits: &str) -> String {
    let value = digits.parse::<u32>().ok();
    NUMERIC_ENTITIES
        .iter()
        .find(|(code, _)| Some(*code) == value)
        .map(|(_, latex)| (*latex).to_string())
        .unwrap_or_else(|| format!("{{[\\&\\#{digits}?]}}"))
}

fn preceded_by_backslash(text: &str, at: usize) -> bool {
    text[..at].ends_with('\\')
}

/// Replaces each `html` entity. For `&#` the digits that follow are passed to
/// `latex` and consumed with the entity.
fn replace_entity(text: &mut String, html: &str, latex: impl Fn(&str) -> String) {
    let numeric = html == "&#";
    let mut pos = 0;
    while let Some(found) = text.get(pos..).and_then(|rest| rest.find(html)) {
        let at = pos + found;
        let mut end = at + html.len();
        if preceded_by_backslash(text, at)
            || text.as_bytes().get(end).is_some_and(u8::is_ascii_alphabetic)
        {
            pos = end;
            continue;
        }

        let mut digits = "";
        if numeric {
            let run = text.as_bytes()[end..]
                .iter()
                .take(MAX_NUMERIC_DIGITS)
                .take_while(|b| b.is_ascii_digit())
                .count();
            digits = &text[end..end + run];
            end += run;
        }
        let replacement = latex(digits);
        if text.as_bytes().get(end) == Some(&b';') {
            end += 1;
        }
        text.replace_range(at..end, &replacement);
        pos = at + replacement.len();
    }
}

fn replace_tag(text: &mut String, template: &str, latex: &str) {
    let mut pos = 0;
    while let Some(m) = text.get(pos..).and_then(|rest| find_flexible(rest, template, Some("i"))) {
        let at = pos + m.start;
        let end = pos + m.end();
        if preceded_by_backslash(text, at) {
            pos = end;
            continue;
        }
        text.replace_range(at..end, latex);
        pos = at + latex.len();
    }
}
