//! # FerroTeX Directive Engine
//!
//! Rewrites and sanitizes untrusted LaTeX math expressions before they are
//! handed to a TeX engine.
//!
//! ## Overview
//!
//! Expressions arrive from web pages and query strings. Before one can be
//! typeset it has to be cleaned up and made safe:
//!
//! - **Decoding**: `%XX` escapes, HTML entities (`&lt;`, `&#43;`) and tags
//!   (`<br>`) are turned back into plain LaTeX
//! - **Denylisting**: `\input`, `\def`, `\catcode` and other dangerous
//!   directives are replaced by a visible "not permitted" placeholder
//! - **Switches**: rendering directives such as `\png`, `\depth`,
//!   `\usepackage{..}` or `\density{..}` are removed from the text and
//!   recorded in a [`RenderContext`]
//! - **Evaluation**: `\eval{term}` is replaced by the value of a small
//!   integer expression
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐            ┌─────────────┐   extract_directive   ┌──────────────┐
//! │  raw input  │ ─────────► │  Sanitizer  │ ───────────────────►  │ scan / splice│
//! └─────────────┘            └──────┬──────┘                       └──────────────┘
//!                                   │ Sanitized { text, cache_key, context }
//!                                   ▼
//!                            render_document()
//! ```
//!
//! Every pass is built on one primitive, [`extract_directive`]: find the next
//! `\name`, read its arguments (braced groups, optional `[..]` arguments,
//! plain-TeX style arguments), and cut it out of the text. Argument
//! boundaries come from the nesting-aware scanner in [`scan`].
//!
//! ## Examples
//!
//! ```
//! use ferrotex_directive::Sanitizer;
//!
//! let sanitizer = Sanitizer::default();
//! let out = sanitizer.sanitize(r"$$\gif \large x^2 \input{/etc/passwd}$$").unwrap();
//!
//! assert_eq!(out.illegal_count, 1);
//! assert_eq!(out.context.font_size_directive(), r"\large");
//! assert!(out.text.starts_with("x^2"));
//! assert!(!out.text.contains(r"\input"));
//! ```
//!
//! ### Extracting a directive
//!
//! ```
//! use ferrotex_directive::{extract_directive, DirectiveQuery};
//!
//! let mut text = String::from(r"a \usepackage[dvips]{color} b");
//! let query = DirectiveQuery::from_count(r"\usepackage", -1);
//! let found = extract_directive(&mut text, &query).unwrap().unwrap();
//!
//! assert_eq!(found.args, ["color"]);
//! assert_eq!(found.optional, ["dvips"]);
//! assert_eq!(text, "a  b");
//! ```

pub mod config;
pub mod context;
pub mod defang;
pub mod denylist;
pub mod directive;
pub mod document;
pub mod entities;
pub mod eval;
pub mod flexmatch;
pub mod pipeline;
pub mod scan;
pub mod splice;


pub use config::{Config, ConfigError};
pub use context::{MathMode, RenderContext};
pub use denylist::{DenyRule, Denylist, validate};
pub use directive::{DirectiveQuery, ExtractError, Extraction, extract_directive};
pub use document::render_document;
pub use entities::preprocess_entities;
pub use eval::{EvalError, SymbolTable, evaluate};
pub use pipeline::{SanitizeError, Sanitized, Sanitizer, sanitize};
