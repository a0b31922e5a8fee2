use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KansaError;
use crate::types::{Language, Mode};

/// Default location of the configuration file, relative to the repository root.
pub const DEFAULT_CONFIG_PATH: &str = ".github/ai-review/config.toml";

/// Default location of the review report, relative to the repository root.
pub const DEFAULT_OUTPUT_PATH: &str = ".github/ai-review/result.md";

/// Size ceiling applied when `exclude.max_file_size` is unset.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100_000;

/// Top-level configuration loaded from `.github/ai-review/config.toml`.
///
/// Loaded once per run and passed by reference to every stage afterwards.
///
/// # Examples
///
/// ```
/// use kansa_core::{Mode, ReviewConfig};
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.mode, Mode::Unified);
/// assert_eq!(config.max_file_size(), 100_000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Paths and sizes excluded from review.
    #[serde(default)]
    pub exclude: ExcludeConfig,
    /// Review aspects in declaration order.
    #[serde(default)]
    pub reviews: Vec<ReviewAspect>,
    /// Unified or per-aspect prompting.
    #[serde(default)]
    pub mode: Mode,
    /// Report language and severity glyphs.
    #[serde(default)]
    pub output: OutputConfig,
    /// Baseline used when fetching diffs.
    #[serde(default)]
    pub diff: DiffConfig,
    /// Completion service settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl ReviewConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`KansaError::FileNotFound`] if `path` does not exist,
    /// [`KansaError::Io`] if it cannot be read, or [`KansaError::Toml`] if
    /// the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kansa_core::ReviewConfig;
    /// use std::path::Path;
    ///
    /// let config = ReviewConfig::from_file(Path::new(".github/ai-review/config.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, KansaError> {
        if !path.exists() {
            return Err(KansaError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`KansaError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use kansa_core::{Mode, ReviewConfig};
    ///
    /// let toml = r#"
    /// mode = "separate"
    ///
    /// [[reviews]]
    /// name = "security"
    /// description = "Security review"
    /// "#;
    /// let config = ReviewConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.mode, Mode::Separate);
    /// assert_eq!(config.reviews.len(), 1);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, KansaError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Enabled aspects, in declaration order.
    pub fn enabled_aspects(&self) -> impl Iterator<Item = &ReviewAspect> {
        self.reviews.iter().filter(|r| r.enabled)
    }

    /// Effective size ceiling in bytes. Zero counts as unset.
    ///
    /// # Examples
    ///
    /// ```
    /// use kansa_core::ReviewConfig;
    ///
    /// let mut config = ReviewConfig::default();
    /// config.exclude.max_file_size = Some(2048);
    /// assert_eq!(config.max_file_size(), 2048);
    /// config.exclude.max_file_size = Some(0);
    /// assert_eq!(config.max_file_size(), 100_000);
    /// ```
    pub fn max_file_size(&self) -> u64 {
        match self.exclude.max_file_size {
            Some(0) | None => DEFAULT_MAX_FILE_SIZE,
            Some(n) => n,
        }
    }
}

/// Files that never reach the completion service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeConfig {
    /// Glob-like patterns; a path is excluded if any pattern matches part of it.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Size ceiling in bytes (default: 100 000).
    pub max_file_size: Option<u64>,
}

/// A single review dimension such as security or style.
///
/// # Examples
///
/// ```
/// use kansa_core::ReviewAspect;
///
/// let aspect: ReviewAspect = toml::from_str(r#"
/// name = "style"
/// description = "Style review"
/// "#).unwrap();
/// assert!(aspect.enabled);
/// assert_eq!(aspect.severity, "warning");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAspect {
    /// Identifier, also used for the default prompt file name.
    pub name: String,
    /// Human-readable title, used as the report heading in separate mode.
    pub description: String,
    /// Disabled aspects are ignored entirely (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Key into `output.emoji` used in separate mode (default: `"warning"`).
    #[serde(default = "default_severity")]
    pub severity: String,
    /// Check items rendered as a bullet list when no prompt file exists.
    pub checks: Option<Vec<String>>,
    /// Prompt file, relative to the config directory
    /// (default: `prompts/<name>.md`).
    pub prompt_file: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_severity() -> String {
    "warning".into()
}

impl ReviewAspect {
    /// Prompt file path relative to the config directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use kansa_core::ReviewAspect;
    /// use std::path::PathBuf;
    ///
    /// let aspect: ReviewAspect = toml::from_str("name = \"perf\"\ndescription = \"Perf\"").unwrap();
    /// assert_eq!(aspect.prompt_path(), PathBuf::from("prompts/perf.md"));
    /// ```
    pub fn prompt_path(&self) -> PathBuf {
        match &self.prompt_file {
            Some(p) => p.clone(),
            None => PathBuf::from(format!("prompts/{}.md", self.name)),
        }
    }
}

/// Report formatting preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Language the model is asked to answer in.
    #[serde(default)]
    pub language: Language,
    /// Severity name to glyph, e.g. `error = "🚨"`.
    #[serde(default)]
    pub emoji: HashMap<String, String>,
}

impl OutputConfig {
    /// Glyph configured for `severity`, or `fallback` when absent or empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use kansa_core::OutputConfig;
    ///
    /// let mut output = OutputConfig::default();
    /// output.emoji.insert("error".into(), "❌".into());
    /// assert_eq!(output.emoji_for("error", "🚨"), "❌");
    /// assert_eq!(output.emoji_for("info", "💡"), "💡");
    /// ```
    pub fn emoji_for<'a>(&'a self, severity: &str, fallback: &'a str) -> &'a str {
        match self.emoji.get(severity) {
            Some(glyph) if !glyph.is_empty() => glyph.as_str(),
            _ => fallback,
        }
    }
}

/// Baseline used for `git diff <base>...HEAD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Integration branch the current branch diverged from (default: `origin/main`).
    #[serde(default = "default_base")]
    pub base: String,
}

fn default_base() -> String {
    "origin/main".into()
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
        }
    }
}

/// Completion service configuration.
///
/// # Examples
///
/// ```
/// use kansa_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "anthropic");
/// assert_eq!(config.max_tokens, 4096);
/// assert_eq!(config.api_key_env(), "ANTHROPIC_API_KEY");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: `"anthropic"` or `"openai"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key. Falls back to the provider's environment variable.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Output token ceiling per call (default: 4096).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request deadline in seconds. Unset means wait indefinitely.
    pub timeout_secs: Option<u64>,
}

fn default_provider() -> String {
    "anthropic".into()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            timeout_secs: None,
        }
    }
}

impl LlmConfig {
    /// Environment variable consulted when `api_key` is unset.
    pub fn api_key_env(&self) -> &'static str {
        match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            _ => "ANTHROPIC_API_KEY",
        }
    }

    /// API key from the config, else from the provider's environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(self.api_key_env()).ok().filter(|k| !k.is_empty()))
    }
}
