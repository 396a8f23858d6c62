//! Rendering settings collected while an expression is sanitized.
//!
//! A [`RenderContext`] starts from the configured defaults and is updated as
//! switch directives (`\png`, `\depth`, `\usepackage{..}`, ...) are
//! recognized and removed from the text. It is owned by a single request.

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Most packages a document may load through `\usepackage` or automatic
/// package selection.
pub const MAX_PACKAGES: usize = 9;

/// Font size directives, smallest first. The render context stores an index
/// into this table.
pub const FONT_SIZES: [&str; 10] = [
    "\\tiny",
    "\\scriptsize",
    "\\footnotesize",
    "\\small",
    "\\normalsize",
    "\\large",
    "\\Large",
    "\\LARGE",
    "\\huge",
    "\\Huge",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathMode {
    /// `\displaystyle`, the default.
    #[default]
    Display,
    /// Inline `$..$` math.
    Text,
    /// No math mode; the expression is typeset as a paragraph.
    Paragraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Gif,
    #[default]
    Png,
}

impl ImageType {
    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Gif => "gif",
            ImageType::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatexMethod {
    #[default]
    Latex,
    Pdflatex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMethod {
    #[default]
    Dvipng,
    /// `dvips` followed by `convert`.
    Dvips,
}

impl ImageMethod {
    /// Gamma correction used when none was requested explicitly.
    pub fn default_gamma(self) -> &'static str {
        match self {
            ImageMethod::Dvipng => "2.5",
            ImageMethod::Dvips => "0.5",
        }
    }
}

/// A `\usepackage[options]{name}` line of the wrapper document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    pub fn with_options(name: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Some(options.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderContext {
    pub math_mode: MathMode,
    /// Index into [`FONT_SIZES`].
    pub font_size: usize,
    pub density: String,
    pub gamma: String,
    /// Set once gamma was given explicitly; image method switches then leave
    /// it alone.
    pub gamma_explicit: bool,
    pub image_type: ImageType,
    pub latex_method: LatexMethod,
    pub image_method: ImageMethod,
    pub quiet: i32,
    pub caching: bool,
    /// Use the wrapper that measures the rendered depth.
    pub depth: bool,
    pub picture: bool,
    pub packages: Vec<Package>,
    /// Requested built-in message, if the expression was a `\message{n}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convert_path: Option<String>,
    pub document_class: String,
    pub document_class_options: String,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RenderContext {
    /// Initial settings for a request.
    pub fn from_config(config: &Config) -> Self {
        let gamma_explicit = config.gamma.is_some();
        let gamma = config
            .gamma
            .clone()
            .unwrap_or_else(|| config.image_method.default_gamma().to_string());
        Self {
            math_mode: config.math_mode,
            font_size: config.font_size,
            density: config.density.clone(),
            gamma,
            gamma_explicit,
            image_type: config.image_type,
            latex_method: config.latex_method,
            image_method: config.image_method,
            quiet: config.quiet,
            caching: config.caching,
            depth: false,
            picture: false,
            packages: Vec::new(),
            message: None,
            convert_path: None,
            document_class: config.document_class.clone(),
            document_class_options: config.document_class_options.clone(),
        }
    }

    /// Switches the image method and, unless gamma is explicit, its gamma.
    pub fn set_image_method(&mut self, method: ImageMethod) {
        self.image_method = method;
        if !self.gamma_explicit {
            self.gamma = method.default_gamma().to_string();
        }
    }

    /// Adds a package unless the package list is full.
    ///
    /// # Returns
    ///
    /// `true` if the package was added.
    pub fn add_package(&mut self, package: Package) -> bool {
        if self.packages.len() >= MAX_PACKAGES {
            return false;
        }
        self.packages.push(package);
        true
    }

    /// Whether a loaded package name contains `name`.
    pub fn has_package(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p.name.contains(name))
    }

    /// The font size directive for [`RenderContext::font_size`].
    pub fn font_size_directive(&self) -> &'static str {
        FONT_SIZES[self.font_size.min(FONT_SIZES.len() - 1)]
    }
}
