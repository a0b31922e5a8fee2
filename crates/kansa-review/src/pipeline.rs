use kansa_core::{FileRecord, KansaError, Mode};
use serde::Serialize;

use crate::llm::Completion;
use crate::prompt::{PromptComposer, NO_ISSUES_SENTINEL};

/// Result of a completed review.
///
/// # Examples
///
/// ```
/// use kansa_review::pipeline::{ReviewReport, ReviewStats};
///
/// let report = ReviewReport {
///     content: String::new(),
///     stats: ReviewStats {
///         files_reviewed: 2,
///         aspects_run: 1,
///         llm_calls: 1,
///         sections_written: 0,
///         model_used: "claude-sonnet-4-20250514".into(),
///     },
/// };
/// assert!(report.is_empty());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    /// Markdown persisted to the result file.
    pub content: String,
    /// Statistics about the run.
    pub stats: ReviewStats,
}

impl ReviewReport {
    /// Whether the review produced nothing to report.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Statistics about a review run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    /// Number of files embedded in the prompt(s).
    pub files_reviewed: usize,
    /// Number of enabled aspects.
    pub aspects_run: usize,
    /// Completion calls issued.
    pub llm_calls: usize,
    /// Aspect sections in the report (separate mode), or 1 for a non-empty
    /// unified report.
    pub sections_written: usize,
    /// Model identifier used for the review.
    pub model_used: String,
}

/// Drives the completion calls and assembles the report.
///
/// Calls are issued one at a time, in aspect order. The first failing call
/// aborts the run and discards whatever earlier calls produced.
pub struct ReviewPipeline<C> {
    llm: C,
    composer: PromptComposer,
}

impl<C: Completion> ReviewPipeline<C> {
    /// Create a pipeline from a completion client and a prompt composer.
    pub fn new(llm: C, composer: PromptComposer) -> Self {
        Self { llm, composer }
    }

    /// Review `files` in the composer's mode.
    ///
    /// # Errors
    ///
    /// Returns the first error from the completion service.
    pub async fn run(&self, files: &[FileRecord]) -> Result<ReviewReport, KansaError> {
        let (content, llm_calls, sections_written) = match self.composer.mode() {
            Mode::Unified => self.run_unified(files).await?,
            Mode::Separate => self.run_separate(files).await?,
        };

        Ok(ReviewReport {
            content,
            stats: ReviewStats {
                files_reviewed: files.len(),
                aspects_run: self.composer.aspects().len(),
                llm_calls,
                sections_written,
                model_used: self.llm.model().to_string(),
            },
        })
    }

    async fn run_unified(&self, files: &[FileRecord]) -> Result<(String, usize, usize), KansaError> {
        tracing::info!("Running unified review...");
        let prompt = self.composer.unified(files);
        let response = self.llm.complete(&prompt).await?;

        if response.contains(NO_ISSUES_SENTINEL) {
            Ok((String::new(), 1, 0))
        } else {
            let sections = usize::from(!response.is_empty());
            Ok((response, 1, sections))
        }
    }

    async fn run_separate(
        &self,
        files: &[FileRecord],
    ) -> Result<(String, usize, usize), KansaError> {
        let mut content = String::new();
        let mut calls = 0;
        let mut sections = 0;

        for aspect in self.composer.aspects() {
            tracing::info!("Running {} review...", aspect.name);
            let prompt = self.composer.separate(aspect, files);
            let response = self.llm.complete(&prompt).await?;
            calls += 1;

            if response.trim().is_empty() || response.contains(NO_ISSUES_SENTINEL) {
                tracing::debug!(aspect = %aspect.name, "no findings");
                continue;
            }
            content.push_str(&format!("## {}\n\n{}\n\n", aspect.description, response));
            sections += 1;
        }

        Ok((content, calls, sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use kansa_core::ReviewConfig;

    /// Replays canned responses and records every prompt it receives.
    struct Scripted {
        responses: Mutex<VecDeque<Result<String, KansaError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<String, KansaError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn ok(responses: &[&str]) -> Self {
            Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl Completion for Scripted {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, KansaError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(KansaError::Llm("no scripted response left".into())))
        }
    }

    const CONFIG: &str = r#"
[[reviews]]
name = "security"
description = "Security"

[[reviews]]
name = "style"
description = "Style"

[[reviews]]
name = "perf"
description = "Performance"
"#;

    fn files() -> Vec<FileRecord> {
        vec![FileRecord {
            path: "src/lib.rs".into(),
            content: "+unsafe { }".into(),
        }]
    }

    fn pipeline(mode: &str, llm: Scripted) -> (ReviewPipeline<Scripted>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ReviewConfig::from_toml(&format!("mode = \"{mode}\"\n{CONFIG}")).unwrap();
        let composer = PromptComposer::new(&config, dir.path());
        (ReviewPipeline::new(llm, composer), dir)
    }

    #[tokio::test]
    async fn unified_response_is_reported_verbatim() {
        let response = "### src/lib.rs\n\n🚨 **[severity: error]** unsafe block\n";
        let (p, _dir) = pipeline("unified", Scripted::ok(&[response]));
        let report = p.run(&files()).await.unwrap();
        assert_eq!(report.content, response);
        assert_eq!(report.stats.llm_calls, 1);
        assert_eq!(report.stats.model_used, "scripted");
    }

    #[tokio::test]
    async fn unified_sentinel_empties_report() {
        let (p, _dir) = pipeline(
            "unified",
            Scripted::ok(&["レビューの結果、問題は見つかりませんでした。"]),
        );
        let report = p.run(&files()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.stats.sections_written, 0);
    }

    #[tokio::test]
    async fn unified_makes_exactly_one_call_with_all_aspects() {
        let (p, _dir) = pipeline("unified", Scripted::ok(&["x"]));
        p.run(&files()).await.unwrap();
        let prompts = p.llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("## Security"));
        assert!(prompts[0].contains("## Performance"));
    }

    #[tokio::test]
    async fn separate_skips_empty_and_sentinel_responses() {
        let (p, _dir) = pipeline(
            "separate",
            Scripted::ok(&["first finding", "  \n", "third finding"]),
        );
        let report = p.run(&files()).await.unwrap();
        assert_eq!(
            report.content,
            "## Security\n\nfirst finding\n\n## Performance\n\nthird finding\n\n"
        );
        assert_eq!(report.stats.llm_calls, 3);
        assert_eq!(report.stats.sections_written, 2);

        let (p, _dir) = pipeline(
            "separate",
            Scripted::ok(&["問題は見つかりませんでした", "style issue", ""]),
        );
        let report = p.run(&files()).await.unwrap();
        assert_eq!(report.content, "## Style\n\nstyle issue\n\n");
    }

    #[tokio::test]
    async fn separate_calls_follow_aspect_order() {
        let (p, _dir) = pipeline("separate", Scripted::ok(&["", "", ""]));
        let report = p.run(&files()).await.unwrap();
        assert!(report.is_empty());
        let prompts = p.llm.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("# レビュー観点: security"));
        assert!(prompts[1].contains("# レビュー観点: style"));
        assert!(prompts[2].contains("# レビュー観点: perf"));
    }

    #[tokio::test]
    async fn separate_failure_discards_earlier_results() {
        let llm = Scripted::new(vec![
            Ok("finding one".into()),
            Err(KansaError::Llm("HTTP 500".into())),
            Ok("never requested".into()),
        ]);
        let (p, _dir) = pipeline("separate", llm);
        let err = p.run(&files()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
        assert_eq!(p.llm.prompts().len(), 2);
    }

    #[tokio::test]
    async fn unified_failure_propagates() {
        let llm = Scripted::new(vec![Err(KansaError::Llm("quota".into()))]);
        let (p, _dir) = pipeline("unified", llm);
        assert!(matches!(p.run(&files()).await, Err(KansaError::Llm(_))));
    }

    #[tokio::test]
    async fn separate_without_enabled_aspects_makes_no_calls() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReviewConfig::from_toml("mode = \"separate\"").unwrap();
        let p = ReviewPipeline::new(Scripted::ok(&[]), PromptComposer::new(&config, dir.path()));
        let report = p.run(&files()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.stats.llm_calls, 0);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_prompts_and_reports() {
        let responses = ["a finding", "", "another"];
        let (first, _d1) = pipeline("separate", Scripted::ok(&responses));
        let (second, _d2) = pipeline("separate", Scripted::ok(&responses));
        let r1 = first.run(&files()).await.unwrap();
        let r2 = second.run(&files()).await.unwrap();
        assert_eq!(r1.content, r2.content);
        assert_eq!(first.llm.prompts(), second.llm.prompts());
    }
}
