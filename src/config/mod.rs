//! Playground configuration management for `atelier.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[compile]` | Component compile policy                         |
//! | `[sandbox]` | Preview frame transport (WebSocket port)         |

mod error;

pub use error::ConfigError;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::compiler::{CompileOptions, CustomElementMatcher};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing atelier.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    /// Compile policy
    #[serde(default)]
    pub compile: CompileConfig,

    /// Preview frame transport settings
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl PlaygroundConfig {
    /// Load configuration from a file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text, warning on unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let (config, ignored) = Self::parse_with_ignored(content)?;
        for field in &ignored {
            crate::log!("config"; "unknown config key `{}` (ignored)", field);
        }
        Ok(config)
    }

    /// Parse while collecting unknown field paths.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Build validated compile options from this config.
    pub fn compile_options(&self) -> Result<CompileOptions, ConfigError> {
        Ok(CompileOptions {
            inline_template: self.compile.inline_template,
            custom_element: self.compile.custom_element.matcher()?,
        })
    }
}

// ============================================================================
// [compile]
// ============================================================================

/// Component compile policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Inline the render function into script-setup output
    #[serde(default = "default_true")]
    pub inline_template: bool,

    /// Custom-element classification: `true`, `false`, or a path pattern
    #[serde(default)]
    pub custom_element: CustomElementConfig,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            inline_template: true,
            custom_element: CustomElementConfig::default(),
        }
    }
}

/// Configured shape of the custom-element classifier.
///
/// Hosts may also install an arbitrary predicate programmatically via
/// [`CustomElementMatcher::Predicate`]; that form has no config spelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomElementConfig {
    /// Classify every file (true) or no file (false)
    Flag(bool),
    /// Classify paths matching this pattern
    Pattern(String),
}

impl Default for CustomElementConfig {
    fn default() -> Self {
        Self::Pattern(r"\.ce\.sfc$".to_string())
    }
}

impl CustomElementConfig {
    /// Compile into the uniform runtime matcher.
    pub fn matcher(&self) -> Result<CustomElementMatcher, ConfigError> {
        match self {
            Self::Flag(true) => Ok(CustomElementMatcher::Always),
            Self::Flag(false) => Ok(CustomElementMatcher::Never),
            Self::Pattern(pattern) => regex::Regex::new(pattern)
                .map(CustomElementMatcher::Pattern)
                .map_err(|e| {
                    ConfigError::Validation(format!(
                        "compile.custom_element pattern `{pattern}` is invalid: {e}"
                    ))
                }),
        }
    }
}

// ============================================================================
// [sandbox]
// ============================================================================

/// Preview frame transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Base port for the sandbox WebSocket server (retried upward when busy)
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    35931
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaygroundConfig::default();
        assert!(config.compile.inline_template);
        assert_eq!(config.sandbox.port, 35931);
        let options = config.compile_options().unwrap();
        assert!(options.custom_element.matches("button.ce.sfc"));
        assert!(!options.custom_element.matches("App.sfc"));
    }

    #[test]
    fn test_parse_full_config() {
        let config = PlaygroundConfig::from_toml_str(
            r#"
            [compile]
            inline_template = false
            custom_element = true

            [sandbox]
            port = 4400
            "#,
        )
        .unwrap();
        assert!(!config.compile.inline_template);
        assert_eq!(config.sandbox.port, 4400);
        let options = config.compile_options().unwrap();
        assert!(options.custom_element.matches("anything.sfc"));
    }

    #[test]
    fn test_custom_element_pattern_form() {
        let config = PlaygroundConfig::from_toml_str(
            r#"
            [compile]
            custom_element = "widget-.*\\.sfc$"
            "#,
        )
        .unwrap();
        let options = config.compile_options().unwrap();
        assert!(options.custom_element.matches("widget-card.sfc"));
        assert!(!options.custom_element.matches("App.sfc"));
    }

    #[test]
    fn test_custom_element_flag_false() {
        let config = PlaygroundConfig::from_toml_str(
            r#"
            [compile]
            custom_element = false
            "#,
        )
        .unwrap();
        let options = config.compile_options().unwrap();
        assert!(!options.custom_element.matches("button.ce.sfc"));
    }

    #[test]
    fn test_invalid_pattern_is_a_validation_error() {
        let config = PlaygroundConfig::from_toml_str(
            r#"
            [compile]
            custom_element = "["
            "#,
        )
        .unwrap();
        match config.compile_options() {
            Err(ConfigError::Validation(message)) => {
                assert!(message.contains("custom_element"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_keys_are_collected_not_fatal() {
        let (config, ignored) = PlaygroundConfig::parse_with_ignored(
            r#"
            [compile]
            inline_template = true
            no_such_option = 1

            [mystery]
            x = 2
            "#,
        )
        .unwrap();
        assert!(config.compile.inline_template);
        assert!(ignored.iter().any(|f| f.contains("no_such_option")));
        assert!(ignored.iter().any(|f| f.contains("mystery")));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            PlaygroundConfig::from_toml_str("[compile\nport = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_from_path_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("atelier.toml");
        fs::write(&path, "[sandbox]\nport = 5000\n").unwrap();
        let config = PlaygroundConfig::from_path(&path).unwrap();
        assert_eq!(config.sandbox.port, 5000);
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            PlaygroundConfig::from_path(Path::new("/nonexistent/atelier.toml")),
            Err(ConfigError::Io(..))
        ));
    }
}
