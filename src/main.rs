use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use kansa_core::{ReviewConfig, DEFAULT_CONFIG_PATH, DEFAULT_OUTPUT_PATH};
use kansa_difflens::fetch::DiffFetcher;
use kansa_difflens::filter::{parse_changed_files, FileSelector};
use kansa_review::llm::{Completion, LlmClient};
use kansa_review::pipeline::ReviewPipeline;
use kansa_review::prompt::PromptComposer;
use kansa_review::report::write_report;

#[derive(Parser)]
#[command(
    name = "kansa",
    version,
    about = "Aspect-driven AI code review for CI",
    long_about = "Reviews the files changed on a branch with an LLM, one review aspect at a time\n\
                  or all at once, and writes the findings to a markdown report.\n\n\
                  Examples:\n  \
                    CHANGED_FILES=\"src/a.rs src/b.rs\" kansa   Review the listed files\n  \
                    kansa --files \"src/a.rs\" --base origin/dev  Diff against another branch\n  \
                    kansa init                                 Create a default config"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(long, global = true, env = "KANSA_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(flatten)]
    review: ReviewArgs,
}

#[derive(clap::Args)]
struct ReviewArgs {
    /// Space-separated list of changed files
    #[arg(long, env = "CHANGED_FILES", hide_env_values = true)]
    files: Option<String>,

    /// Where to write the review report
    #[arg(long, env = "KANSA_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Baseline ref for diffs (overrides `diff.base` in the config)
    #[arg(long, env = "KANSA_BASE")]
    base: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default configuration file
    #[command(long_about = "Create a default configuration file.\n\n\
        Writes a commented template to the --config path.\n\
        Fails if the file already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# kansa configuration
# Prompt files are resolved relative to this file's directory.

# "unified": one request covering every aspect
# "separate": one request per aspect, reported under the aspect's description
mode = "unified"

[exclude]
paths = ["**/*.lock", "**/package-lock.json", "dist/**", "vendor/**"]
# max_file_size = 100000

[output]
language = "ja"

[output.emoji]
error = "🚨"
warning = "⚠️"
info = "💡"

[diff]
# base = "origin/main"

[llm]
# provider = "anthropic"          # or "openai"
# model = "claude-sonnet-4-20250514"
# max_tokens = 4096
# api_key defaults to ANTHROPIC_API_KEY / OPENAI_API_KEY

[[reviews]]
name = "security"
description = "セキュリティ"
severity = "error"
checks = [
    "Injection (SQL, command, path traversal)",
    "Secrets or credentials committed to the repository",
    "Missing authentication or authorization checks",
]

[[reviews]]
name = "quality"
description = "コード品質"
severity = "warning"
# prompt_file = "prompts/quality.md"
"#;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug,hyper=warn,reqwest=warn,rustls=warn,h2=warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_init(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        miette::bail!("{} already exists", config_path.display());
    }
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .wrap_err(format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(config_path, DEFAULT_CONFIG).into_diagnostic()?;
    println!("Created {} with default configuration", config_path.display());
    Ok(())
}

fn finish_empty(output: &Path, message: &str) -> Result<()> {
    tracing::info!("{message}");
    write_report(output, "")?;
    Ok(())
}

async fn run_review(config_path: &Path, args: &ReviewArgs) -> Result<()> {
    let config = ReviewConfig::from_file(config_path)?;

    let candidates = parse_changed_files(args.files.as_deref().unwrap_or_default());
    if candidates.is_empty() {
        return finish_empty(&args.output, "No files to review");
    }

    let selection = FileSelector::from_config(&config, ".").select(&candidates);
    for skipped in &selection.skipped {
        tracing::debug!("skipped {} ({})", skipped.path, skipped.reason);
    }
    if selection.kept.is_empty() {
        return finish_empty(&args.output, "No files to review after filtering");
    }

    let aspect_names: Vec<&str> = config.enabled_aspects().map(|a| a.name.as_str()).collect();
    tracing::info!("Reviewing {} files...", selection.kept.len());
    tracing::info!("Enabled reviews: {}", aspect_names.join(", "));

    let base = args.base.as_deref().unwrap_or(&config.diff.base);
    let records = DiffFetcher::new(".", base).fetch_all(&selection.kept);
    if records.is_empty() {
        return finish_empty(&args.output, "No readable files to review");
    }

    let prompt_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let composer = PromptComposer::new(&config, prompt_dir);

    if config.llm.resolved_api_key().is_none() {
        tracing::warn!(
            "no API key configured; set {} or llm.api_key",
            config.llm.api_key_env()
        );
    }
    let llm = LlmClient::new(&config.llm)?;
    tracing::debug!(model = llm.model(), mode = %config.mode, "starting review");
    let pipeline = ReviewPipeline::new(llm, composer);

    let spinner = if std::io::stderr().is_terminal() {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                .into_diagnostic()?,
        );
        pb.set_message(format!("Waiting for {}...", config.llm.model));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = pipeline.run(&records).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result?;

    write_report(&args.output, &report.content)?;
    tracing::info!("Review completed");
    tracing::debug!(
        files = report.stats.files_reviewed,
        aspects = report.stats.aspects_run,
        calls = report.stats.llm_calls,
        sections = report.stats.sections_written,
        model = %report.stats.model_used,
        "review stats"
    );

    if report.is_empty() {
        println!("No issues found");
    } else {
        println!("Issues found:");
        println!("{}", report.content);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Command::Init) => run_init(&cli.config),
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "kansa", &mut std::io::stdout());
            Ok(())
        }
        None => run_review(&cli.config, &cli.review).await,
    }
}
