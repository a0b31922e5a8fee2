//! Pre-review file selection.
//!
//! Drops changed files that no longer exist, match an exclusion pattern, or
//! exceed the size ceiling before any diff is fetched. Nothing here aborts a
//! run: every per-file problem turns into "skip" or "keep".

use std::io;
use std::path::{Path, PathBuf};

use kansa_core::ReviewConfig;
use regex::Regex;

/// A compiled exclusion glob.
///
/// `**` matches any run of characters including `/`, a single `*` matches any
/// run of characters except `/`, and everything else is literal. The match is
/// unanchored: a pattern matching any fragment of a path excludes the path.
///
/// # Examples
///
/// ```
/// use kansa_difflens::filter::ExcludePattern;
///
/// let pat = ExcludePattern::new("dist/**").unwrap();
/// assert!(pat.matches("packages/web/dist/app.js"));
/// assert!(!pat.matches("src/app.js"));
/// ```
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    source: String,
    regex: Regex,
}

impl ExcludePattern {
    /// Compile a glob into an exclusion pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the translated expression is rejected, for
    /// instance because it exceeds the size limit.
    pub fn new(glob: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&glob_to_regex(glob))?;
        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    /// Whether the pattern matches anywhere in `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The glob this pattern was built from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut literal = String::new();
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '*' {
            literal.push(c);
            continue;
        }
        out.push_str(&regex::escape(&literal));
        literal.clear();
        if chars.peek() == Some(&'*') {
            chars.next();
            out.push_str(".*");
        } else {
            out.push_str("[^/]*");
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

/// Why a candidate file was left out of the review set.
///
/// # Examples
///
/// ```
/// use kansa_difflens::filter::SkipReason;
///
/// assert_eq!(SkipReason::Missing.to_string(), "missing");
/// assert_eq!(SkipReason::TooLarge(200_000).to_string(), "too large (200000 bytes)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a file on disk at selection time.
    Missing,
    /// Matched the exclusion glob.
    PatternMatch(String),
    /// Larger than the size ceiling.
    TooLarge(u64),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Missing => write!(f, "missing"),
            SkipReason::PatternMatch(pat) => write!(f, "pattern: {pat}"),
            SkipReason::TooLarge(size) => write!(f, "too large ({size} bytes)"),
        }
    }
}

/// A candidate that did not make it into the review set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path as given in the candidate list.
    pub path: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of [`FileSelector::select`].
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Files to review, in candidate order.
    pub kept: Vec<String>,
    /// Files left out, in candidate order.
    pub skipped: Vec<SkippedFile>,
}

/// Applies existence, exclusion and size rules to a changed-file list.
///
/// Candidate paths are resolved against `root`.
///
/// # Examples
///
/// ```
/// use kansa_core::ReviewConfig;
/// use kansa_difflens::filter::FileSelector;
///
/// let mut config = ReviewConfig::default();
/// config.exclude.paths = vec!["**/*.lock".into()];
/// let selector = FileSelector::from_config(&config, ".");
/// assert!(selector.is_excluded("frontend/yarn.lock"));
/// assert!(!selector.is_excluded("src/main.rs"));
/// ```
pub struct FileSelector {
    root: PathBuf,
    patterns: Vec<ExcludePattern>,
    max_file_size: u64,
}

impl FileSelector {
    /// Build a selector from the `[exclude]` section of `config`.
    ///
    /// Patterns that fail to compile are dropped with a warning.
    pub fn from_config(config: &ReviewConfig, root: impl Into<PathBuf>) -> Self {
        let mut patterns = Vec::new();
        for glob in &config.exclude.paths {
            match ExcludePattern::new(glob) {
                Ok(p) => patterns.push(p),
                Err(e) => tracing::warn!(pattern = %glob, error = %e, "ignoring exclusion pattern"),
            }
        }

        Self {
            root: root.into(),
            patterns,
            max_file_size: config.max_file_size(),
        }
    }

    /// Whether `path` matches any exclusion pattern.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.matching_pattern(path).is_some()
    }

    fn matching_pattern(&self, path: &str) -> Option<&ExcludePattern> {
        self.patterns.iter().find(|p| p.matches(path))
    }

    /// Filter `candidates`, probing sizes through filesystem metadata.
    pub fn select(&self, candidates: &[String]) -> Selection {
        self.select_with(candidates, |path| std::fs::metadata(path).map(|m| m.len()))
    }

    /// Filter `candidates`, probing sizes with `probe`.
    ///
    /// A probe error keeps the file: an unknown size is never a reason to
    /// leave a file out.
    pub fn select_with<F>(&self, candidates: &[String], probe: F) -> Selection
    where
        F: Fn(&Path) -> io::Result<u64>,
    {
        let mut selection = Selection::default();

        for candidate in candidates {
            let full = self.root.join(candidate);
            let reason = if !full.is_file() {
                Some(SkipReason::Missing)
            } else if let Some(pat) = self.matching_pattern(candidate) {
                Some(SkipReason::PatternMatch(pat.as_str().to_string()))
            } else {
                match probe(&full) {
                    Ok(size) if size > self.max_file_size => Some(SkipReason::TooLarge(size)),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::debug!(path = %candidate, error = %e, "size probe failed, keeping file");
                        None
                    }
                }
            };

            match reason {
                Some(reason) => {
                    tracing::debug!(path = %candidate, %reason, "skipping file");
                    selection.skipped.push(SkippedFile {
                        path: candidate.clone(),
                        reason,
                    });
                }
                None => selection.kept.push(candidate.clone()),
            }
        }

        selection
    }
}

/// Split a space-separated changed-file list, dropping empty entries.
///
/// # Examples
///
/// ```
/// use kansa_difflens::filter::parse_changed_files;
///
/// assert_eq!(parse_changed_files(" a.rs  b.rs "), vec!["a.rs", "b.rs"]);
/// assert!(parse_changed_files("").is_empty());
/// ```
pub fn parse_changed_files(raw: &str) -> Vec<String> {
    raw.split(' ')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
