use std::path::Path;
use std::process::Output;

use tokio::process::Command;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULT: &str = ".github/ai-review/result.md";

fn write_config(root: &Path, body: &str) {
    let dir = root.join(".github/ai-review");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), body).unwrap();
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn llm_section(server_uri: &str) -> String {
    format!("[llm]\nprovider = \"anthropic\"\napi_key = \"test-key\"\nbase_url = \"{server_uri}\"\n")
}

async fn kansa(root: &Path, changed: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kansa"));
    cmd.current_dir(root)
        .env_remove("CHANGED_FILES")
        .env_remove("KANSA_CONFIG")
        .env_remove("KANSA_OUTPUT")
        .env_remove("KANSA_BASE")
        .env_remove("ANTHROPIC_API_KEY")
        .env("RUST_LOG", "info");
    if let Some(files) = changed {
        cmd.env("CHANGED_FILES", files);
    }
    cmd.output().await.unwrap()
}

fn anthropic_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "content": [{"type": "text", "text": text}]
    }))
}

fn read_result(root: &Path) -> String {
    std::fs::read_to_string(root.join(RESULT)).unwrap()
}

#[tokio::test]
async fn no_changed_files_writes_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "");
    std::fs::write(dir.path().join(RESULT), "stale").unwrap();

    let out = kansa(dir.path(), None).await;
    assert!(out.status.success());
    assert_eq!(read_result(dir.path()), "");

    let out = kansa(dir.path(), Some("   ")).await;
    assert!(out.status.success());
    assert_eq!(read_result(dir.path()), "");
}

#[tokio::test]
async fn nothing_left_after_filtering_writes_empty_report() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "[exclude]\npaths = [\"dist/**\"]\n");
    write_file(dir.path(), "dist/app.js", "var a;");

    let out = kansa(dir.path(), Some("src/deleted.rs dist/app.js")).await;
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(read_result(dir.path()), "");
}

#[tokio::test]
async fn missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = kansa(dir.path(), Some("a.rs")).await;
    assert!(!out.status.success());
    assert!(!dir.path().join(RESULT).exists());
}

#[tokio::test]
async fn invalid_config_fails_without_report() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "mode = [not toml");
    write_file(dir.path(), "a.rs", "fn a() {}");
    let out = kansa(dir.path(), Some("a.rs")).await;
    assert!(!out.status.success());
    assert!(!dir.path().join(RESULT).exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn unified_findings_are_written_verbatim() {
    let server = MockServer::start().await;
    let findings = "### src/a.rs\n\n🚨 **[severity: error]** unchecked input";
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_string_contains("### src/a.rs"))
        .respond_with(anthropic_text(findings))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        &format!(
            "[[reviews]]\nname = \"security\"\ndescription = \"Security\"\n\n{}",
            llm_section(&server.uri())
        ),
    );
    write_file(dir.path(), "src/a.rs", "fn a(input: &str) {}\n");

    let out = kansa(dir.path(), Some("src/a.rs")).await;
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(read_result(dir.path()), findings);
    assert!(String::from_utf8_lossy(&out.stdout).contains("Issues found:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unified_sentinel_writes_empty_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(anthropic_text("問題は見つかりませんでした"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &llm_section(&server.uri()));
    write_file(dir.path(), "a.rs", "fn a() {}\n");

    let out = kansa(dir.path(), Some("a.rs")).await;
    assert!(out.status.success());
    assert_eq!(read_result(dir.path()), "");
    assert!(String::from_utf8_lossy(&out.stdout).contains("No issues found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn separate_mode_groups_findings_by_aspect() {
    let server = MockServer::start().await;
    for (aspect, text) in [
        ("security", "sql injection"),
        ("style", ""),
        ("perf", "n+1 query"),
    ] {
        Mock::given(method("POST"))
            .and(body_string_contains(format!("# レビュー観点: {aspect}")))
            .respond_with(anthropic_text(text))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        &format!(
            r#"mode = "separate"

[[reviews]]
name = "security"
description = "Security"

[[reviews]]
name = "style"
description = "Style"

[[reviews]]
name = "perf"
description = "Performance"

{}"#,
            llm_section(&server.uri())
        ),
    );
    write_file(dir.path(), "db.rs", "fn query() {}\n");

    let out = kansa(dir.path(), Some("db.rs")).await;
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(
        read_result(dir.path()),
        "## Security\n\nsql injection\n\n## Performance\n\nn+1 query\n\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_failure_exits_non_zero_without_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &llm_section(&server.uri()));
    write_file(dir.path(), "a.rs", "fn a() {}\n");

    let out = kansa(dir.path(), Some("a.rs")).await;
    assert!(!out.status.success());
    assert!(!dir.path().join(RESULT).exists());
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread")]
async fn unreadable_files_short_circuit_without_a_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(anthropic_text("finding about nothing"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &llm_section(&server.uri()));

    // A regular file by metadata whose read fails.
    let out = kansa(dir.path(), Some("/proc/self/mem")).await;
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(read_result(dir.path()), "");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn separate_mode_skips_aspect_without_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("# レビュー観点: security"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("# レビュー観点: perf"))
        .respond_with(anthropic_text("n+1 query"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        &format!(
            r#"mode = "separate"

[[reviews]]
name = "security"
description = "Security"

[[reviews]]
name = "perf"
description = "Performance"

{}"#,
            llm_section(&server.uri())
        ),
    );
    write_file(dir.path(), "db.rs", "fn query() {}\n");

    let out = kansa(dir.path(), Some("db.rs")).await;
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(read_result(dir.path()), "## Performance\n\nn+1 query\n\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_is_reported_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &llm_section(&server.uri()));
    write_file(dir.path(), "a.rs", "fn a() {}\n");

    let out = kansa(dir.path(), Some("a.rs")).await;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.matches("overloaded").count(), 1, "{stderr}");
}
