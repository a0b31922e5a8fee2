use std::fmt;

use serde::{Deserialize, Serialize};

/// How enabled review aspects are sent to the completion service.
///
/// Any value other than `"separate"` selects [`Mode::Unified`].
///
/// # Examples
///
/// ```
/// use kansa_core::Mode;
///
/// assert_eq!(Mode::from("separate".to_string()), Mode::Separate);
/// assert_eq!(Mode::from("whatever".to_string()), Mode::Unified);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    /// One prompt covering every enabled aspect.
    #[default]
    Unified,
    /// One prompt per enabled aspect, run sequentially.
    Separate,
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "separate" => Mode::Separate,
            _ => Mode::Unified,
        }
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Unified => write!(f, "unified"),
            Mode::Separate => write!(f, "separate"),
        }
    }
}

/// Language the review should be written in.
///
/// Only `"ja"` is recognized; anything else means English.
///
/// # Examples
///
/// ```
/// use kansa_core::Language;
///
/// assert_eq!(Language::from("ja".to_string()).label(), "日本語");
/// assert_eq!(Language::from("de".to_string()).label(), "English");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// Japanese output.
    Ja,
    /// English output.
    #[default]
    En,
}

impl Language {
    /// Name of the language as written into the prompt's rule block.
    pub fn label(self) -> &'static str {
        match self {
            Language::Ja => "日本語",
            Language::En => "English",
        }
    }
}

impl From<String> for Language {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ja" => Language::Ja,
            _ => Language::En,
        }
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        match lang {
            Language::Ja => "ja".into(),
            Language::En => "en".into(),
        }
    }
}

/// A selected file paired with the text sent for review.
///
/// `content` is the file's diff against the baseline, or its full current
/// content when no diff is available.
///
/// # Examples
///
/// ```
/// use kansa_core::FileRecord;
///
/// let record = FileRecord {
///     path: "src/lib.rs".into(),
///     content: "+fn added() {}".into(),
/// };
/// assert_eq!(record.path, "src/lib.rs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path as given in the changed-file list.
    pub path: String,
    /// Diff text or full file content.
    pub content: String,
}
