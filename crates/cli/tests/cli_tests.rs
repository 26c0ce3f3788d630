//! CLI integration tests
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("chinaland")
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

/// Empty config file so a user's own config never leaks into a test.
fn empty_config(tmp: &TempDir) -> String {
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "").unwrap();
    path.to_string_lossy().into_owned()
}

async fn archive() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/ipLogin"))
        .respond_with(ok(Value::Null))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/magazine/queryYearByColumn"))
        .respond_with(ok(json!(["2025", "2024"])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/magazine/queryMagazineByColumn"))
        .and(body_string_contains("year=2025"))
        .respond_with(ok(json!([
            { "id": "m10", "pageName": "第10期", "title": "中国土地 2025年第10期", "date": "2025-10-15" },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/magazine/getArticleByMagazineId"))
        .and(body_string_contains("magazineId=m10"))
        .respond_with(ok(json!([
            { "id": "a1", "index": 1, "title": "卷首语", "author": "编辑部" },
            { "id": "a2", "index": 2, "title": "耕地保护" },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/magazine/getArticleById"))
        .and(body_string_contains("articleId=a1"))
        .respond_with(ok(json!({ "id": "a1", "html": "<p>卷首语正文</p>" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/magazine/getArticleById"))
        .and(body_string_contains("articleId=a2"))
        .respond_with(ok(json!({
            "id": "a2",
            "html": "<p>耕地正文</p><img src=\"<%basePath%>/batch/a2.jpg\" alt=\"农田\">",
        })))
        .mount(&server)
        .await;
    server
}

fn run_against(server: &MockServer, tmp: &TempDir) -> assert_cmd::Command {
    let mut command = cmd();
    command.args([
        "--config",
        &empty_config(tmp),
        "--base-url",
        &server.uri(),
        "--delay-ms",
        "0",
        "--timeout",
        "5",
    ]);
    command
}

#[test]
fn test_cli_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_cli_completions() {
    cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chinaland"));
}

#[test]
fn test_cli_missing_arguments() {
    cmd().arg("issues").assert().failure();
    cmd().args(["export", "issue", "2025"]).assert().failure();
}

#[test]
fn test_cli_invalid_layout() {
    cmd()
        .args(["export", "year", "2025", "--layout", "chapter"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("chapter"));
}

#[test]
fn test_cli_missing_config_file() {
    cmd()
        .args(["--config", "/nonexistent/chinaland.toml", "years"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_years() {
    let server = archive().await;
    let tmp = TempDir::new().unwrap();

    run_against(&server, &tmp)
        .arg("years")
        .assert()
        .success()
        .stdout(predicate::str::contains("2025\n2024"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_articles() {
    let server = archive().await;
    let tmp = TempDir::new().unwrap();

    run_against(&server, &tmp)
        .args(["articles", "2025", "第10期"])
        .assert()
        .success()
        .stdout(predicate::str::contains("卷首语"))
        .stdout(predicate::str::contains("耕地保护"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_show_article() {
    let server = archive().await;
    let tmp = TempDir::new().unwrap();

    run_against(&server, &tmp)
        .args(["show", "2025", "1", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## 002 耕地保护"))
        .stdout(predicate::str::contains(format!("![农田]({}/dataFile/batch/a2.jpg)", server.uri())))
        .stdout(predicate::str::ends_with("耕地正文\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_export_issue() {
    let server = archive().await;
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");

    run_against(&server, &tmp)
        .args(["export", "issue", "2025", "第10期", "-o", out.to_str().unwrap()])
        .assert()
        .success();

    let content = std::fs::read_to_string(out.join("2025_第10期.md")).unwrap();
    assert!(content.starts_with("# 中国土地 2025年第10期"));
    assert!(content.contains("- 出版日期：2025-10-15"));
    assert!(content.find("## 001 卷首语").unwrap() < content.find("## 002 耕地保护").unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_export_unknown_issue() {
    let server = archive().await;
    let tmp = TempDir::new().unwrap();

    run_against(&server, &tmp)
        .args(["export", "issue", "2025", "第99期", "-o", tmp.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("第99期"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_export_year_reports_failures() {
    let server = archive().await;
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");

    // 2024 has no issue listing mounted, so its lookup fails
    run_against(&server, &tmp)
        .args(["export", "all", "-o", out.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("2024"));

    assert!(out.join("2025_第10期.md").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_dump_and_rebuild_offline() {
    let server = archive().await;
    let tmp = TempDir::new().unwrap();
    let online = tmp.path().join("online");
    let offline = tmp.path().join("offline");
    let dump = tmp.path().join("dump.jsonl");

    run_against(&server, &tmp)
        .args(["export", "issue", "2025", "第10期", "-o", online.to_str().unwrap()])
        .args(["--dump", dump.to_str().unwrap()])
        .assert()
        .success();
    drop(server);

    cmd()
        .args(["--config", &empty_config(&tmp), "--base-url", "http://127.0.0.1:9"])
        .args(["export", "from-jsonl", dump.to_str().unwrap(), "-o", offline.to_str().unwrap()])
        .assert()
        .success();

    let original = std::fs::read(online.join("2025_第10期.md")).unwrap();
    let rebuilt = std::fs::read(offline.join("2025_第10期.md")).unwrap();
    assert_eq!(original, rebuilt);
}

#[test]
fn test_cli_rebuild_missing_dump() {
    cmd()
        .args(["export", "from-jsonl", "/nonexistent/dump.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dump"));
}
