//! Display-safe rendering of reserved LaTeX characters.

/// Substitutions in the order they are applied. The backslash goes first so
/// the escapes introduced by later rows are not escaped again.
const DEFANG_TABLE: &[(&str, &str)] = &[
    ("\\", "\\textbackslash "),
    ("_", "\\textunderscore "),
    ("<", "\\textlangle "),
    (">", "\\textrangle "),
    ("$", "\\textdollar "),
    ("&", "\\&"),
    ("%", "\\%"),
    ("#", "\\#"),
    ("~", "\\~"),
    ("{", "\\{"),
    ("}", "\\}"),
    ("^", "\\ensuremath{\\widehat{~}}"),
];

/// Returns a copy of `s` that typesets as the literal characters of `s`.
///
/// # Examples
///
/// ```
/// use ferrotex_directive::defang::defang;
///
/// assert_eq!(defang(r"\input{a_b}"), r"\textbackslash input\{a\textunderscore b\}");
/// ```
pub fn defang(s: &str) -> String {
    DEFANG_TABLE
        .iter()
        .fold(s.to_string(), |acc, (from, to)| acc.replace(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defang_plain_text_is_unchanged() {
        assert_eq!(defang("abc 123"), "abc 123");
        assert_eq!(defang(""), "");
    }

    #[test]
    fn test_defang_escapes_each_reserved_character() {
        assert_eq!(defang("&%#~"), r"\&\%\#\~");
        assert_eq!(defang("<x>"), r"\textlangle x\textrangle ");
        assert_eq!(defang("$"), r"\textdollar ");
    }

    #[test]
    fn test_defang_does_not_reescape_its_own_output() {
        assert_eq!(defang("^"), r"\ensuremath{\widehat{~}}");
        assert_eq!(defang(r"\{"), r"\textbackslash \{");
    }
}
