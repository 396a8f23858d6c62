//! Sanitizer configuration.
//!
//! Configuration is a JSON document. Every field has a default, so `{}` is a
//! valid configuration and a file only needs the settings it changes:
//!
//! ```json
//! {
//!   "density": "150",
//!   "image_method": "dvips",
//!   "denylist": [{ "name": "\\href", "nargs": 2, "display": "#2" }]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{FONT_SIZES, ImageMethod, ImageType, LatexMethod, MathMode};
use crate::denylist::DenyRule;
use crate::directive::{ArgFormat, FormatError};

/// Default limit on the input expression, in bytes.
pub const DEFAULT_MAX_EXPRESSION_LEN: usize = 32767;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("denylist rule {name}: {source}")]
    InvalidRule { name: String, source: FormatError },
    #[error("font size {0} is out of range (0 to 9)")]
    FontSize(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_expression_len: usize,
    pub density: String,
    /// Index into the font size table, `\tiny` = 0 to `\Huge` = 9.
    pub font_size: usize,
    pub math_mode: MathMode,
    pub image_type: ImageType,
    pub latex_method: LatexMethod,
    pub image_method: ImageMethod,
    pub quiet: i32,
    pub caching: bool,
    /// Explicit gamma. Without it gamma follows the image method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma: Option<String>,
    /// Rules enforced after the built-in denylist.
    pub denylist: Vec<DenyRule>,
    pub document_class: String,
    pub document_class_options: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_expression_len: DEFAULT_MAX_EXPRESSION_LEN,
            density: "120".to_string(),
            font_size: 4,
            math_mode: MathMode::Display,
            image_type: ImageType::Png,
            latex_method: LatexMethod::Latex,
            image_method: ImageMethod::Dvipng,
            quiet: 3,
            caching: true,
            gamma: None,
            denylist: Vec::new(),
            document_class: "article".to_string(),
            document_class_options: "10pt".to_string(),
        }
    }
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Checks the font size and every extra denylist format code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.font_size >= FONT_SIZES.len() {
            return Err(ConfigError::FontSize(self.font_size));
        }
        for rule in &self.denylist {
            ArgFormat::parse_code(rule.format).map_err(|source| ConfigError::InvalidRule {
                name: rule.name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
