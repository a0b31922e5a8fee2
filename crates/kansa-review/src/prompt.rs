use std::fmt::Write;
use std::path::{Path, PathBuf};

use kansa_core::{FileRecord, Mode, OutputConfig, ReviewAspect, ReviewConfig};

/// Phrase the model is told to answer with when nothing is wrong.
pub const NO_ISSUES_SENTINEL: &str = "問題は見つかりませんでした";

const PREAMBLE: &str =
    "あなたはコードレビューの専門家です。以下の観点でコードをレビューしてください。";

const FINDING_BODY: &str = "\
- 該当箇所: `該当コード`
- 理由: なぜ問題なのか
- 修正案: どう修正すべきか";

/// Resolve the instruction body for one aspect.
///
/// Resolution order:
/// 1. the prompt file (`prompt_file`, or `prompts/<name>.md`) under
///    `prompt_dir`, verbatim, when it can be read;
/// 2. a bullet list built from `checks`;
/// 3. the bare `## <description>` header.
///
/// # Examples
///
/// ```
/// use kansa_core::ReviewAspect;
/// use kansa_review::prompt::resolve_aspect_body;
///
/// let aspect = ReviewAspect {
///     name: "security".into(),
///     description: "Security".into(),
///     enabled: true,
///     severity: "error".into(),
///     checks: Some(vec!["SQL injection".into()]),
///     prompt_file: None,
/// };
/// let body = resolve_aspect_body(&aspect, std::path::Path::new("/nonexistent"));
/// assert!(body.starts_with("## Security"));
/// assert!(body.ends_with("- SQL injection"));
/// ```
pub fn resolve_aspect_body(aspect: &ReviewAspect, prompt_dir: &Path) -> String {
    let path = prompt_dir.join(aspect.prompt_path());
    if path.is_file() {
        match std::fs::read_to_string(&path) {
            Ok(text) => return text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable prompt file, using defaults")
            }
        }
    }

    match &aspect.checks {
        Some(checks) => {
            let mut body = format!(
                "## {}\n\n以下の項目をチェックしてください:",
                aspect.description
            );
            for check in checks {
                let _ = write!(body, "\n- {check}");
            }
            body
        }
        None => format!("## {}", aspect.description),
    }
}

/// Render file records as `### <path>` headers with fenced contents.
///
/// # Examples
///
/// ```
/// use kansa_core::FileRecord;
/// use kansa_review::prompt::render_files;
///
/// let files = vec![FileRecord { path: "a.rs".into(), content: "+x".into() }];
/// assert_eq!(render_files(&files), "### a.rs\n```\n+x\n```");
/// ```
pub fn render_files(files: &[FileRecord]) -> String {
    files
        .iter()
        .map(|f| format!("### {}\n```\n{}\n```", f.path, f.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds review prompts from configuration and collected files.
///
/// Output depends only on the configuration, the prompt files on disk and
/// the records passed in; aspects and files keep their given order.
pub struct PromptComposer {
    mode: Mode,
    output: OutputConfig,
    aspects: Vec<ReviewAspect>,
    prompt_dir: PathBuf,
}

impl PromptComposer {
    /// Create a composer for the enabled aspects of `config`.
    ///
    /// `prompt_dir` is the directory prompt files are resolved against,
    /// normally the directory holding the config file.
    pub fn new(config: &ReviewConfig, prompt_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: config.mode,
            output: config.output.clone(),
            aspects: config.enabled_aspects().cloned().collect(),
            prompt_dir: prompt_dir.into(),
        }
    }

    /// Prompting mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Enabled aspects in declaration order.
    pub fn aspects(&self) -> &[ReviewAspect] {
        &self.aspects
    }

    /// Instruction body for `aspect`.
    pub fn aspect_body(&self, aspect: &ReviewAspect) -> String {
        resolve_aspect_body(aspect, &self.prompt_dir)
    }

    /// One prompt covering every enabled aspect.
    pub fn unified(&self, files: &[FileRecord]) -> String {
        let bodies = self
            .aspects
            .iter()
            .map(|a| self.aspect_body(a))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let error = self.output.emoji_for("error", "🚨");
        let warning = self.output.emoji_for("warning", "⚠️");
        let info = self.output.emoji_for("info", "💡");

        format!(
            "{PREAMBLE}

# レビュー観点

{bodies}

# レビュー対象のコード（差分）

{files}

# 出力形式

問題が見つかった場合のみ、以下の形式で出力してください:

### [ファイル名]

{error} **[severity: error]** 問題の説明
{FINDING_BODY}

{warning} **[severity: warning]** 問題の説明
...

{info} **[severity: info]** 問題の説明
...

# ルール
- 問題がない場合は「{NO_ISSUES_SENTINEL}」とだけ出力
- 推測や曖昧な指摘は避け、具体的な問題のみ指摘
- 重要度の高い問題を優先して報告
- {language}で出力",
            files = render_files(files),
            language = self.output.language.label(),
        )
    }

    /// A prompt scoped to a single aspect, using that aspect's glyph.
    pub fn separate(&self, aspect: &ReviewAspect, files: &[FileRecord]) -> String {
        let body = self.aspect_body(aspect);
        let glyph = self.output.emoji_for(&aspect.severity, "⚠️");

        format!(
            "{PREAMBLE}

# レビュー観点: {name}

{body}

# レビュー対象のコード（差分）

{files}

# 出力形式

問題が見つかった場合のみ、以下の形式で出力してください:

### [ファイル名]

{glyph} **問題の説明**
{FINDING_BODY}

# ルール
- 問題がない場合は空文字を出力
- 推測や曖昧な指摘は避け、具体的な問題のみ指摘
- {language}で出力",
            name = aspect.name,
            files = render_files(files),
            language = self.output.language.label(),
        )
    }
}
