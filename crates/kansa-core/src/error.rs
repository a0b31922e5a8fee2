use std::path::PathBuf;

/// Errors that can occur across kansa.
///
/// Library crates return this type directly; the binary renders it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use kansa_core::KansaError;
///
/// let err = KansaError::Llm("quota exceeded".into());
/// assert!(err.to_string().contains("quota exceeded"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum KansaError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(kansa::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(kansa::config))]
    Config(String),

    /// Completion API or response error.
    #[error("LLM error: {0}")]
    #[diagnostic(
        code(kansa::llm),
        help("check the API key and llm settings; no report was written")
    )]
    Llm(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(kansa::config))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(
        code(kansa::file_not_found),
        help("run `kansa init` to create a default configuration")
    )]
    FileNotFound(PathBuf),
}
