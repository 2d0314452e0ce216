//! Configuration for Parley.
//!
//! The configuration file lives at `~/.parley/config.toml` and is optional.
//! It is read once at startup into [`Settings`], which the rest of the
//! application treats as a read-only, process-wide lookup.

mod code_scope;
mod language;

pub use code_scope::{CodeScope, CodeScopeError, KNOWN_LANGUAGES};
pub use language::Language;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_MAX_MESSAGES: u32 = 10;
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CODE_SCOPE: &str = "c, cpp, csharp, go, java, javascript, typescript, python, rust, bash, sql, json";

const fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// On-disk configuration file.
///
/// ```toml
/// [limits]
/// max_tokens = 4000
/// max_messages_num = 10
///
/// [response]
/// stream_enable = true
/// timeout_secs = 120
///
/// [display]
/// markdown_code_scope = "rust, python"
/// language = "en"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfig {
    pub limits: Option<LimitsConfig>,
    pub response: Option<ResponseConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitsConfig {
    pub max_tokens: Option<u32>,
    pub max_messages_num: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseConfig {
    /// Append streamed chunks instead of replacing the answer. Default: true.
    #[serde(default = "default_true")]
    pub stream_enable: bool,
    /// Seconds without a response event before the turn is abandoned.
    pub timeout_secs: Option<u64>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            stream_enable: true,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DisplayConfig {
    pub markdown_code_scope: Option<String>,
    pub language: Option<String>,
}

impl ParleyConfig {
    /// Load the config file from its default location.
    ///
    /// Returns `Ok(None)` when there is no home directory or no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".parley").join("config.toml"))
}

/// Resolved, read-only settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub max_tokens: u32,
    pub max_messages_num: u32,
    pub stream_enable: bool,
    pub markdown_code_scope: String,
    pub language: Language,
    pub response_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            max_messages_num: DEFAULT_MAX_MESSAGES,
            stream_enable: true,
            markdown_code_scope: DEFAULT_CODE_SCOPE.to_string(),
            language: Language::default(),
            response_timeout: Duration::from_secs(DEFAULT_RESPONSE_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn from_config(config: Option<&ParleyConfig>) -> Self {
        let mut settings = Self::default();
        let Some(config) = config else {
            return settings;
        };

        if let Some(limits) = &config.limits {
            if let Some(max_tokens) = limits.max_tokens {
                settings.max_tokens = max_tokens;
            }
            if let Some(max_messages) = limits.max_messages_num {
                settings.max_messages_num = max_messages;
            }
        }

        if let Some(response) = &config.response {
            settings.stream_enable = response.stream_enable;
            if let Some(secs) = response.timeout_secs {
                settings.response_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(display) = &config.display {
            if let Some(scope) = &display.markdown_code_scope {
                settings.markdown_code_scope.clone_from(scope);
            }
            if let Some(raw) = &display.language {
                settings.language = Language::parse_or_default(raw);
            }
        }

        settings
    }

    /// Apply `PARLEY_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("PARLEY_MAX_TOKENS") {
            match raw.trim().parse() {
                Ok(value) => self.max_tokens = value,
                Err(_) => tracing::warn!("Ignoring invalid PARLEY_MAX_TOKENS: {raw}"),
            }
        }
        if let Some(raw) = lookup("PARLEY_MAX_MESSAGES") {
            match raw.trim().parse() {
                Ok(value) => self.max_messages_num = value,
                Err(_) => tracing::warn!("Ignoring invalid PARLEY_MAX_MESSAGES: {raw}"),
            }
        }
        if let Some(raw) = lookup("PARLEY_STREAM") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => self.stream_enable = true,
                "0" | "false" | "off" => self.stream_enable = false,
                _ => tracing::warn!("Ignoring invalid PARLEY_STREAM: {raw}"),
            }
        }
    }

    /// Parse the markdown code scope, degrading to [`CodeScope::Auto`] on error.
    ///
    /// The error is returned alongside so the caller can tell the user.
    #[must_use]
    pub fn code_scope(&self) -> (CodeScope, Option<CodeScopeError>) {
        match CodeScope::parse(&self.markdown_code_scope) {
            Ok(scope) => (scope, None),
            Err(err) => {
                tracing::warn!("Invalid markdown_code_scope, falling back to auto: {err}");
                (CodeScope::Auto, Some(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn parse(content: &str) -> ParleyConfig {
        toml::from_str(content).expect("valid toml")
    }

    #[test]
    fn defaults_without_config() {
        let settings = Settings::from_config(None);
        assert_eq!(settings.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(settings.max_messages_num, DEFAULT_MAX_MESSAGES);
        assert!(settings.stream_enable);
        assert_eq!(settings.language, Language::En);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = parse(
            r#"
            [limits]
            max_tokens = 1200
            max_messages_num = 0

            [response]
            stream_enable = false
            timeout_secs = 5

            [display]
            markdown_code_scope = "rust"
            language = "zh"
            "#,
        );
        let settings = Settings::from_config(Some(&config));
        assert_eq!(settings.max_tokens, 1200);
        assert_eq!(settings.max_messages_num, 0);
        assert!(!settings.stream_enable);
        assert_eq!(settings.response_timeout, Duration::from_secs(5));
        assert_eq!(settings.markdown_code_scope, "rust");
        assert_eq!(settings.language, Language::Zh);
    }

    #[test]
    fn empty_response_section_keeps_streaming() {
        let config = parse("[response]\n");
        let settings = Settings::from_config(Some(&config));
        assert!(settings.stream_enable);
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            ("PARLEY_MAX_TOKENS", "250"),
            ("PARLEY_MAX_MESSAGES", "many"),
            ("PARLEY_STREAM", "off"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|key| env.get(key).map(ToString::to_string));
        assert_eq!(settings.max_tokens, 250);
        assert_eq!(settings.max_messages_num, DEFAULT_MAX_MESSAGES);
        assert!(!settings.stream_enable);
    }

    #[test]
    fn invalid_code_scope_degrades_to_auto() {
        let settings = Settings {
            markdown_code_scope: "rust, klingon".to_string(),
            ..Settings::default()
        };
        let (scope, err) = settings.code_scope();
        assert_eq!(scope, CodeScope::Auto);
        assert!(err.is_some());
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = ParleyConfig::load_from(&dir.path().join("absent.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "[limits]\nmax_tokens = \"lots\"").expect("write");

        let err = ParleyConfig::load_from(&path).expect_err("parse error");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }
}
