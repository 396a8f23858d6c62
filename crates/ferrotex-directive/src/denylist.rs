//! Denylist validation.
//!
//! Directives that can read files, redefine commands or reach TeX internals
//! are cut out of the expression and replaced with a visible placeholder, so
//! the author sees what was refused:
//!
//! ```text
//! \input{/etc/passwd}
//! ──► \mbox{~\underline{\textbackslash input\{/etc/passwd\}~not~permitted}~}
//! ```

use log::warn;
use serde::{Deserialize, Serialize};

use crate::defang::defang;
use crate::directive::{
    ArgFormat, DirectiveQuery, ExtractError, Extraction, FormatError, extract_directive_from,
};

/// What the validator does with a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// The rule is listed but not enforced.
    Ignore,
    #[default]
    Apply,
}

/// One denylist row, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyRule {
    #[serde(default)]
    pub action: Action,
    /// Directive name including its backslash, e.g. `\input`.
    pub name: String,
    #[serde(default)]
    pub nargs: usize,
    /// Index of the required argument that optional `[arg]`s may precede.
    #[serde(default)]
    pub optional_at: Option<usize>,
    /// Argument-format code, one decimal digit per argument (see
    /// [`ArgFormat::parse_code`]).
    #[serde(default)]
    pub format: u64,
    /// Replacement template. `#1`..`#9` stand for the arguments and `[#0]`
    /// for the optional ones. Without a template the standard "not permitted"
    /// placeholder is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl DenyRule {
    pub fn new(name: &str, nargs: usize, optional_at: Option<usize>, format: u64) -> Self {
        Self {
            action: Action::Apply,
            name: name.to_string(),
            nargs,
            optional_at,
            format,
            display: None,
        }
    }

    fn compile(&self) -> Result<CompiledRule, FormatError> {
        let mut query = DirectiveQuery::new(self.name.clone(), self.nargs)
            .formats(ArgFormat::parse_code(self.format)?);
        if let Some(pos) = self.optional_at {
            query = query.optional_at(pos);
        }
        Ok(CompiledRule {
            action: self.action,
            query,
            display: self.display.clone(),
        })
    }
}

/// Directives with no argument that must never reach TeX.
const BARE_DIRECTIVES: &[&str] = &[
    "\\loop",
    "\\csname",
    "\\catcode",
    "\\output",
    "\\everycr",
    "\\everypar",
    "\\everymath",
    "\\everyhbox",
    "\\everyvbox",
    "\\everyjob",
    "\\openin",
    "\\read",
    "\\openout",
    "\\write",
    // ^^ escapes reach arbitrary character codes
    "^^",
];

/// The built-in rules, in the order they are enforced.
pub fn standard_rules() -> Vec<DenyRule> {
    let mut rules = vec![
        DenyRule::new("\\newcommand", 2, Some(1), 0),
        DenyRule::new("\\providecommand", 2, Some(1), 0),
        DenyRule::new("\\renewcommand", 2, Some(1), 0),
        DenyRule::new("\\input", 1, None, 0),
        DenyRule::new("\\def", 2, None, 20),
        DenyRule::new("\\edef", 2, None, 20),
        DenyRule::new("\\gdef", 2, None, 20),
        DenyRule::new("\\xdef", 2, None, 20),
    ];
    rules.extend(BARE_DIRECTIVES.iter().map(|name| DenyRule::new(name, 0, None, 0)));
    rules
}

#[derive(Debug, Clone)]
struct CompiledRule {
    action: Action,
    query: DirectiveQuery,
    display: Option<String>,
}

/// A compiled, ordered set of deny rules.
#[derive(Debug, Clone)]
pub struct Denylist {
    rules: Vec<CompiledRule>,
}

impl Default for Denylist {
    fn default() -> Self {
        Self::standard()
    }
}

impl Denylist {
    /// The built-in denylist.
    pub fn standard() -> Self {
        let rules = standard_rules()
            .iter()
            .filter_map(|rule| rule.compile().ok())
            .collect();
        Self { rules }
    }

    /// Compiles `rules`, checking every format code.
    pub fn from_rules(rules: &[DenyRule]) -> Result<Self, FormatError> {
        let rules = rules.iter().map(DenyRule::compile).collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    /// Appends `rules` after the existing ones.
    pub fn extend(&mut self, rules: &[DenyRule]) -> Result<(), FormatError> {
        for rule in rules {
            self.rules.push(rule.compile()?);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Neutralizes every denylisted directive in `text` and returns how many
    /// were found.
    ///
    /// Each occurrence is replaced by its placeholder. A directive whose
    /// arguments are malformed is still replaced, along with whatever part of
    /// its arguments could be read.
    pub fn validate(&self, text: &mut String) -> usize {
        let mut count = 0;
        for rule in self.rules.iter().filter(|r| r.action == Action::Apply) {
            let mut from = 0;
            loop {
                let (at, display) = match extract_directive_from(text, &rule.query, from) {
                    Ok(None) => break,
                    Ok(Some(found)) => {
                        let display = rule.render(&found);
                        text.insert_str(found.at, &display);
                        (found.at, display)
                    }
                    Err(ExtractError::Malformed {
                        start,
                        end,
                        args,
                        optional,
                        optional_count,
                        reason,
                        ..
                    }) => {
                        warn!(
                            "malformed {} at byte {} ({:?}), neutralizing what was read",
                            rule.query.name(),
                            start,
                            reason
                        );
                        let partial = Extraction {
                            at: start,
                            args,
                            optional,
                            optional_count,
                        };
                        let display = rule.render(&partial);
                        text.replace_range(start..end, &display);
                        (start, display)
                    }
                };
                warn!("neutralized denylisted {} at byte {}", rule.query.name(), at);
                count += 1;
                from = if display.is_empty() {
                    // Let a directive re-formed across the cut be found again.
                    at.saturating_sub(rule.query.name().len().saturating_sub(1))
                } else {
                    at + display.len()
                };
            }
        }
        count
    }
}

impl CompiledRule {
    fn render(&self, found: &Extraction) -> String {
        let optional: String = found
            .optional
            .iter()
            .filter(|arg| !arg.is_empty())
            .map(|arg| format!("[{}]", defang(arg)))
            .collect();
        let has_optional = found.optional_count > 0;
        let optional_at = self.query.optional_position();

        match &self.display {
            None => {
                let mut display = String::from("\\mbox{~\\underline{");
                display.push_str(&defang(self.query.name()));
                for iarg in 0..self.query.nargs() {
                    if optional_at == Some(iarg) && has_optional {
                        display.push_str(&optional);
                    }
                    let Some(arg) = found.args.get(iarg).filter(|a| !a.is_empty()) else {
                        break;
                    };
                    if self.query.format_of(iarg) == ArgFormat::Latex {
                        display.push_str("\\{");
                        display.push_str(&defang(arg));
                        display.push_str("\\}");
                    } else {
                        display.push_str(&defang(arg));
                    }
                }
                display.push_str("~not~permitted}~}");
                display
            }
            Some(template) => {
                let mut display = template.clone();
                if !has_optional {
                    display = display.replace("[#0]", "");
                }
                for iarg in 0..self.query.nargs() {
                    if optional_at == Some(iarg) && has_optional {
                        display = display.replace("[#0]", &optional);
                    }
                    let Some(arg) = found.args.get(iarg).filter(|a| !a.is_empty()) else {
                        break;
                    };
                    display = display.replace(&format!("#{}", iarg + 1), &defang(arg));
                }
                display
            }
        }
    }
}

/// Runs the built-in denylist over `text`.
pub fn validate(text: &mut String) -> usize {
    Denylist::standard().validate(text)
}
