//! The sanitizing driver.
//!
//! [`Sanitizer::sanitize`] runs every pass over one expression, in order:
//!
//! ```text
//! raw ──► url unescape ──► entities/delimiters ──► denylist
//!     ──► \message ──► environments & switches ──► \usepackage
//!     ──► \density/\gammacorrection ──► \eval ──► auto packages
//!     ──► denylist again ──► Sanitized
//! ```
//!
//! Every switch directive is handled through [`extract_directive`] or
//! [`replace`]; the render settings they select accumulate in a
//! [`RenderContext`] owned by the request.

use log::{debug, info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::context::{
    FONT_SIZES, ImageMethod, ImageType, LatexMethod, MAX_PACKAGES, MathMode, Package,
    RenderContext,
};
use crate::denylist::Denylist;
use crate::directive::{DirectiveQuery, Extraction, extract_directive, find_directive};
use crate::entities::{preprocess_entities, unescape_url};
use crate::eval::{SymbolTable, evaluate};
use crate::splice::{Case, replace};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("expression is {len} bytes, the limit is {limit}")]
    TooLong { len: usize, limit: usize },
    #[error("expression is empty after preprocessing")]
    Empty,
}

/// A sanitized expression, ready to be wrapped and rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sanitized {
    pub text: String,
    /// SHA-256 of the expression as received, hex encoded.
    pub cache_key: String,
    /// Number of denylisted directives that were neutralized.
    pub illegal_count: usize,
    pub context: RenderContext,
}

/// A directive that only toggles a setting.
struct Switch {
    name: &'static str,
    case: Case,
    apply: fn(&mut RenderContext),
}

const MATH_STYLE_SWITCHES: &[Switch] = &[
    Switch {
        name: "\\displaystyle",
        case: Case::Insensitive,
        apply: |ctx| ctx.math_mode = MathMode::Display,
    },
    Switch {
        name: "\\textstyle",
        case: Case::Insensitive,
        apply: |ctx| ctx.math_mode = MathMode::Text,
    },
    Switch {
        name: "\\parstyle",
        case: Case::Insensitive,
        apply: |ctx| ctx.math_mode = MathMode::Paragraph,
    },
    Switch {
        name: "\\parmode",
        case: Case::Insensitive,
        apply: |ctx| ctx.math_mode = MathMode::Paragraph,
    },
];

const QUIET_SWITCHES: &[Switch] = &[
    Switch {
        name: "\\quiet",
        case: Case::Insensitive,
        apply: |ctx| ctx.quiet = 64,
    },
    Switch {
        name: "\\noquiet",
        case: Case::Insensitive,
        apply: |ctx| ctx.quiet = 0,
    },
];

const DEPTH_SWITCHES: &[Switch] = &[
    Switch {
        name: "\\depth",
        case: Case::Insensitive,
        apply: |ctx| ctx.depth = true,
    },
    Switch {
        name: "\\nodepth",
        case: Case::Insensitive,
        apply: |ctx| ctx.depth = false,
    },
];

const OUTPUT_SWITCHES: &[Switch] = &[
    Switch {
        name: "\\png",
        case: Case::Insensitive,
        apply: |ctx| ctx.image_type = ImageType::Png,
    },
    Switch {
        name: "\\gif",
        case: Case::Insensitive,
        apply: |ctx| ctx.image_type = ImageType::Gif,
    },
    // \LaTeX is the logo, not a switch.
    Switch {
        name: "\\latex",
        case: Case::Sensitive,
        apply: |ctx| ctx.latex_method = LatexMethod::Latex,
    },
    Switch {
        name: "\\pdflatex",
        case: Case::Insensitive,
        apply: |ctx| ctx.latex_method = LatexMethod::Pdflatex,
    },
    Switch {
        name: "\\dvipng",
        case: Case::Insensitive,
        apply: |ctx| ctx.set_image_method(ImageMethod::Dvipng),
    },
    Switch {
        name: "\\dvips",
        case: Case::Insensitive,
        apply: |ctx| ctx.set_image_method(ImageMethod::Dvips),
    },
];

const CACHE_SWITCHES: &[Switch] = &[
    Switch {
        name: "\\cache",
        case: Case::Insensitive,
        apply: |ctx| ctx.caching = true,
    },
    Switch {
        name: "\\nocache",
        case: Case::Insensitive,
        apply: |ctx| ctx.caching = false,
    },
];

/// Removes every switch in `table` from `text`, applying those that occurred.
/// Returns `true` if any did.
fn apply_switches(text: &mut String, ctx: &mut RenderContext, table: &[Switch]) -> bool {
    let mut any = false;
    for switch in table {
        if replace(text, switch.name, "", switch.case, 0).unwrap_or(0) > 0 {
            debug!("switch {} applied", switch.name);
            (switch.apply)(ctx);
            any = true;
        }
    }
    any
}

/// Like [`extract_directive`], but a malformed directive is logged and
/// treated as absent. Its text stays in the expression.
fn take(text: &mut String, query: &DirectiveQuery) -> Option<Extraction> {
    match extract_directive(text, query) {
        Ok(found) => found,
        Err(err) => {
            warn!("{}", err);
            None
        }
    }
}

/// Takes `query` and returns its first argument.
fn take_arg(text: &mut String, query: &DirectiveQuery) -> Option<String> {
    take(text, query).map(|found| found.args.into_iter().next().unwrap_or_default())
}

/// The integer at the start of `s`, or 0.
fn leading_int(s: &str) -> i32 {
    let s = s.trim_start();
    let len = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && (c == '+' || c == '-')))
        .count();
    s[..len].parse().unwrap_or(0)
}

/// Replaces each `\eval{term}` in `text` with the value of `term`. Returns the
/// number of directives resolved.
pub(crate) fn resolve_evals(text: &mut String, symbols: &SymbolTable) -> usize {
    let query = DirectiveQuery::new("\\eval", 1);
    let mut count = 0;
    while let Some(found) = take(text, &query) {
        let term = found.args.first().map(String::as_str).unwrap_or_default();
        let value = if term.is_empty() {
            0
        } else {
            evaluate(symbols, term).unwrap_or_else(|err| {
                warn!("\\eval{{{}}}: {}", term, err);
                0
            })
        };
        debug!("\\eval{{{}}} = {}", term, value);
        text.insert_str(found.at, &value.to_string());
        count += 1;
    }
    count
}

/// Symbols visible to `\eval{}` for a request.
pub(crate) fn symbols_for(ctx: &RenderContext) -> SymbolTable {
    let mut symbols = SymbolTable::new();
    let font_size = i64::try_from(ctx.font_size).unwrap_or_default();
    symbols.insert("fontsize", font_size);
    symbols.insert("fs", font_size);
    symbols
}

/// Runs the full sanitizing pipeline with a fixed configuration.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    config: Config,
    denylist: Denylist,
}

impl Sanitizer {
    /// Builds a sanitizer, compiling the configured denylist rules after the
    /// built-in ones.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut denylist = Denylist::standard();
        for rule in &config.denylist {
            denylist
                .extend(std::slice::from_ref(rule))
                .map_err(|source| ConfigError::InvalidRule {
                    name: rule.name.clone(),
                    source,
                })?;
        }
        Ok(Self { config, denylist })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sanitizes one expression.
    ///
    /// # Errors
    ///
    /// [`SanitizeError::TooLong`] if the input exceeds the configured limit,
    /// [`SanitizeError::Empty`] if nothing is left to render.
    pub fn sanitize(&self, input: &str) -> Result<Sanitized, SanitizeError> {
        let limit = self.config.max_expression_len;
        if input.len() > limit {
            return Err(SanitizeError::TooLong {
                len: input.len(),
                limit,
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        let cache_key = hex::encode(hasher.finalize());

        let mut ctx = RenderContext::from_config(&self.config);
        let mut text = unescape_url(input);
        if let Some(mode) = preprocess_entities(&mut text) {
            ctx.math_mode = mode;
        }
        let mut illegal_count = self.denylist.validate(&mut text);
        if illegal_count > 0 {
            warn!("{} denylisted directive(s) neutralized", illegal_count);
        }

        if let Some(arg) = take_arg(&mut text, &DirectiveQuery::new("\\message", 1)) {
            let message = leading_int(&arg);
            info!("message {} requested", message);
            ctx.message = Some(message);
            illegal_count += self.revalidate(&mut text);
            return Ok(Sanitized {
                text: text.trim().to_string(),
                cache_key,
                illegal_count,
                context: ctx,
            });
        }

        self.environments(&mut text, &mut ctx);
        self.directives(&mut text, &mut ctx);

        let evals = resolve_evals(&mut text, &symbols_for(&ctx));
        if evals > 0 {
            debug!("resolved {} \\eval directive(s)", evals);
        }
        auto_packages(&text, &mut ctx);
        illegal_count += self.revalidate(&mut text);

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(SanitizeError::Empty);
        }
        info!(
            "sanitized {} bytes into {} bytes ({} illegal, {} package(s))",
            input.len(),
            text.len(),
            illegal_count,
            ctx.packages.len()
        );
        Ok(Sanitized {
            text,
            cache_key,
            illegal_count,
            context: ctx,
        })
    }

    /// Denylist pass over text that later passes have cut into. Removing a
    /// directive joins its neighbours, which can form a denied one
    /// (`\in\usepackage{x}put`).
    fn revalidate(&self, text: &mut String) -> usize {
        let count = self.denylist.validate(text);
        if count > 0 {
            warn!("{} denylisted directive(s) formed by directive removal", count);
        }
        count
    }

    /// Settings implied by the environments the expression uses.
    fn environments(&self, text: &mut String, ctx: &mut RenderContext) {
        if text.contains("picture") {
            ctx.picture = true;
        }
        if replace(text, "\\nopicture", "", Case::Insensitive, 0).unwrap_or(0) > 0 {
            ctx.picture = false;
        }
        if ctx.picture {
            debug!("picture environment, switching to dvips and paragraph mode");
            ctx.set_image_method(ImageMethod::Dvips);
            ctx.math_mode = MathMode::Paragraph;
            ctx.depth = false;
        }
        if text.contains("gather") || text.contains("eqnarray") {
            ctx.math_mode = MathMode::Paragraph;
        }
    }

    fn directives(&self, text: &mut String, ctx: &mut RenderContext) {
        apply_switches(text, ctx, MATH_STYLE_SWITCHES);

        apply_switches(text, ctx, QUIET_SWITCHES);
        if let Some(arg) = take_arg(text, &DirectiveQuery::new("\\nquiet", 1)) {
            ctx.quiet = leading_int(&arg);
        }

        if let Some(mut path) = take_arg(text, &DirectiveQuery::new("\\convertpath", 1)) {
            if !path.contains("convert") {
                if !path.ends_with('/') {
                    path.push('/');
                }
                path.push_str("convert");
            }
            ctx.convert_path = Some(path);
        }

        for (index, size) in FONT_SIZES.iter().enumerate() {
            if find_directive(text, size, Case::Sensitive, 0).is_some() {
                if ctx.math_mode != MathMode::Paragraph {
                    replace(text, size, "", Case::Sensitive, 0).ok();
                }
                ctx.font_size = index;
            }
        }

        let depth_requested = find_directive(text, "\\depth", Case::Insensitive, 0).is_some();
        apply_switches(text, ctx, DEPTH_SWITCHES);
        if depth_requested {
            // Blanks arrive as ~ when a \depth request goes through a URL.
            replace(text, "~", " ", Case::Sensitive, 0).ok();
        }

        let usepackage = DirectiveQuery::from_count("\\usepackage", -1);
        while ctx.packages.len() < MAX_PACKAGES {
            let Some(found) = take(text, &usepackage) else {
                break;
            };
            let name = found.args.into_iter().next().unwrap_or_default();
            let package = match found.optional.into_iter().next().filter(|o| !o.is_empty()) {
                Some(options) => Package::with_options(name, options),
                None => Package::new(name),
            };
            debug!("\\usepackage{{{}}}", package.name);
            ctx.add_package(package);
        }

        replace(text, "\\version", "", Case::Insensitive, 0).ok();

        apply_switches(text, ctx, OUTPUT_SWITCHES);

        let density = take_arg(text, &DirectiveQuery::new("\\density", 1).numeric())
            .or_else(|| take_arg(text, &DirectiveQuery::new("\\dpi", 1).numeric()));
        if let Some(density) = density.filter(|d| !d.is_empty()) {
            ctx.density = density;
        }
        let gamma = take_arg(text, &DirectiveQuery::new("\\gammacorrection", 1).numeric());
        if let Some(gamma) = gamma.filter(|g| !g.is_empty()) {
            ctx.gamma = gamma;
            ctx.gamma_explicit = true;
        }

        apply_switches(text, ctx, CACHE_SWITCHES);
    }
}

/// Packages the expression needs but did not load.
fn auto_packages(text: &str, ctx: &mut RenderContext) {
    if !ctx.has_package("color") && text.contains("\\color") {
        ctx.add_package(Package::new("color"));
    }
    if !ctx.picture {
        return;
    }
    match ctx.latex_method {
        LatexMethod::Latex => {
            if !ctx.has_package("eepic") {
                ctx.add_package(Package::new("eepic"));
            }
        }
        LatexMethod::Pdflatex => {
            if ctx.packages.len() + 1 >= MAX_PACKAGES {
                warn!("no room for the pict2e and preview packages");
                return;
            }
            if !ctx.has_package("pict2e") {
                ctx.add_package(Package::new("pict2e"));
            }
            if !ctx.has_package("preview") {
                ctx.add_package(Package::with_options("preview", "active,tightpage"));
            }
        }
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            config: Config::default(),
            denylist: Denylist::standard(),
        }
    }
}

/// Sanitizes `input` with the default configuration.
pub fn sanitize(input: &str) -> Result<Sanitized, SanitizeError> {
    Sanitizer::default().sanitize(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int(" 12abc"), 12);
        assert_eq!(leading_int("-3"), -3);
        assert_eq!(leading_int("x1"), 0);
        assert_eq!(leading_int(""), 0);
    }

    #[test]
    fn test_resolve_evals() {
        let mut symbols = SymbolTable::new();
        symbols.insert("fs", 4);
        let mut text = String::from(r"a\eval{fs+1}b\eval{}c\eval{2*3}");
        assert_eq!(resolve_evals(&mut text, &symbols), 3);
        assert_eq!(text, "a5b0c6");
    }

    #[test]
    fn test_switch_table_rows_fire_once() {
        let mut ctx = RenderContext::default();
        let mut text = String::from(r"\GIF x \gif \dvips");
        assert!(apply_switches(&mut text, &mut ctx, OUTPUT_SWITCHES));
        assert_eq!(ctx.image_type, ImageType::Gif);
        assert_eq!(ctx.image_method, ImageMethod::Dvips);
        assert_eq!(text.trim(), "x");
    }

    #[test]
    fn test_latex_switch_is_case_sensitive() {
        let mut ctx = RenderContext::default();
        ctx.latex_method = LatexMethod::Pdflatex;
        let mut text = String::from(r"\LaTeX");
        assert!(!apply_switches(&mut text, &mut ctx, OUTPUT_SWITCHES));
        assert_eq!(text, r"\LaTeX");
        assert_eq!(ctx.latex_method, LatexMethod::Pdflatex);
    }
}
