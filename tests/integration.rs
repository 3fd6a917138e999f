use axum::{routing::post, Json, Router};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn snaptext_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("snaptext");
    path
}

fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let images_dir = root.join("images");
    fs::create_dir_all(&images_dir).unwrap();
    fs::write(images_dir.join("receipt.png"), b"fake png").unwrap();
    fs::write(images_dir.join("menu.jpg"), b"fake jpg").unwrap();
    fs::write(images_dir.join("notes.txt"), b"not an image").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/snaptext.sqlite"

[extraction]
base_url = "{base_url}"
timeout_secs = 5

[export]
dir = "{root}/exports"
"#,
        root = root.display(),
        base_url = base_url,
    );

    let config_path = config_dir.join("snaptext.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_snaptext(config_path: &Path, api_key: Option<&str>, args: &[&str]) -> (String, String, bool) {
    let binary = snaptext_binary();
    let root = config_path.parent().and_then(Path::parent).unwrap();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(root)
        .env_remove("DATABASE_URL")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args);
    if let Some(key) = api_key {
        cmd.env("OPENAI_API_KEY", key);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run snaptext binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Fake chat-completions endpoint that always answers `reply`.
async fn fake_vision_api(reply: &'static str) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || async move {
            Json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": reply } }]
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

const UNREACHABLE_API: &str = "http://127.0.0.1:9/v1";

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env(UNREACHABLE_API);

    let (stdout, stderr, success) = run_snaptext(&config_path, None, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/snaptext.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env(UNREACHABLE_API);

    let (_, _, success1) = run_snaptext(&config_path, None, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_snaptext(&config_path, None, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_empty_history() {
    let (_tmp, config_path) = setup_test_env(UNREACHABLE_API);
    run_snaptext(&config_path, None, &["init"]);

    let (stdout, _, success) = run_snaptext(&config_path, None, &["list"]);
    assert!(success);
    assert!(stdout.contains("No saved records"));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["search", "--keyword", "x"]);
    assert!(success);
    assert!(stdout.contains("No matching records"));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["export", "--format", "csv"]);
    assert!(success);
    assert!(stdout.contains("No records to export"));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["stats"]);
    assert!(success);
    assert!(stdout.contains("No records saved yet"));
}

#[test]
fn test_missing_ids_fail() {
    let (_tmp, config_path) = setup_test_env(UNREACHABLE_API);
    run_snaptext(&config_path, None, &["init"]);

    for args in [
        vec!["get", "42"],
        vec!["delete", "42"],
        vec!["edit", "42", "--text", "new"],
    ] {
        let (_, stderr, success) = run_snaptext(&config_path, None, &args);
        assert!(!success, "{:?} should fail on a missing id", args);
        assert!(stderr.contains("record not found: 42"), "stderr={}", stderr);
    }
}

#[test]
fn test_invalid_search_date_fails() {
    let (_tmp, config_path) = setup_test_env(UNREACHABLE_API);

    let (_, stderr, success) = run_snaptext(&config_path, None, &["search", "--from", "2024/01/01"]);
    assert!(!success);
    assert!(stderr.contains("YYYY-MM-DD"), "stderr={}", stderr);
}

#[test]
fn test_extract_without_key_is_disabled() {
    let (tmp, config_path) = setup_test_env(UNREACHABLE_API);
    let image = tmp.path().join("images/receipt.png");

    let (_, stderr, success) =
        run_snaptext(&config_path, None, &["extract", image.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("extraction disabled"), "stderr={}", stderr);
    assert!(stderr.contains("OPENAI_API_KEY"));

    // Everything else keeps working without a key.
    let (_, _, success) = run_snaptext(&config_path, None, &["list"]);
    assert!(success);
}

#[test]
fn test_unreachable_api_fails_without_saving() {
    let (tmp, config_path) = setup_test_env(UNREACHABLE_API);
    let image = tmp.path().join("images/receipt.png");

    let (_, stderr, success) = run_snaptext(
        &config_path,
        Some("sk-test"),
        &["extract", image.to_str().unwrap(), "--save"],
    );
    assert!(!success);
    assert!(stderr.contains("text extraction failed for receipt.png"), "stderr={}", stderr);

    let (stdout, _, _) = run_snaptext(&config_path, None, &["list"]);
    assert!(stdout.contains("No saved records"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_extract_save_browse_export_delete() {
    let base_url = fake_vision_api("TOTAL 12,500\n감사합니다").await;
    let (tmp, config_path) = setup_test_env(&base_url);
    let images = tmp.path().join("images");
    let receipt = images.join("receipt.png");
    let menu = images.join("menu.jpg");
    let notes = images.join("notes.txt");

    // Single extraction prints the text.
    let (stdout, stderr, success) = run_snaptext(
        &config_path,
        Some("sk-test"),
        &["extract", receipt.to_str().unwrap(), "--save"],
    );
    assert!(success, "extract failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("TOTAL 12,500"));
    assert!(stdout.contains("Saved record 1."));

    // Batch with one unsupported file: the rest still run and get saved.
    let (stdout, _, success) = run_snaptext(
        &config_path,
        Some("sk-test"),
        &[
            "extract",
            menu.to_str().unwrap(),
            notes.to_str().unwrap(),
            "--save",
            "--progress",
            "off",
        ],
    );
    assert!(!success, "a batch with a failure exits non-zero");
    assert!(stdout.contains("[ok] menu.jpg"));
    assert!(stdout.contains("[error] notes.txt"));
    assert!(stdout.contains("1 succeeded, 1 failed"));
    assert!(stdout.contains("Saved 1 record(s)."));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["list"]);
    assert!(success);
    assert!(stdout.contains("2 record(s)"));
    let menu_pos = stdout.find("menu.jpg").unwrap();
    let receipt_pos = stdout.find("receipt.png").unwrap();
    assert!(menu_pos < receipt_pos, "newest first: {}", stdout);
    assert!(!stdout.contains("notes.txt"));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["search", "--keyword", "total"]);
    assert!(success);
    assert!(stdout.contains("2 record(s)"));

    let (stdout, _, success) = run_snaptext(
        &config_path,
        None,
        &["search", "--keyword", "total", "--to", "2000-01-01"],
    );
    assert!(success);
    assert!(stdout.contains("No matching records"));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["edit", "1", "--text", "fixed text"]);
    assert!(success);
    assert!(stdout.contains("Updated record 1."));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["get", "1"]);
    assert!(success);
    assert!(stdout.contains("receipt.png"));
    assert!(stdout.contains("fixed text"));

    let (stdout, _, success) = run_snaptext(&config_path, None, &["export", "--format", "csv"]);
    assert!(success);
    assert!(stdout.contains("Exported 2 records"));
    let exports: Vec<PathBuf> = fs::read_dir(tmp.path().join("exports"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(exports.len(), 1);
    let name = exports[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("extracted_texts_") && name.ends_with(".csv"), "{}", name);
    let csv = fs::read(&exports[0]).unwrap();
    assert!(csv.starts_with(&[0xEF, 0xBB, 0xBF]));
    let csv = String::from_utf8_lossy(&csv[3..]).to_string();
    assert!(csv.starts_with("ID,Filename,Extracted Text,Created At"));
    assert!(csv.contains("감사합니다"));

    let out_dir = tmp.path().join("xlsx-out");
    let (_, _, success) = run_snaptext(
        &config_path,
        None,
        &["export", "--format", "xlsx", "--output", out_dir.to_str().unwrap()],
    );
    assert!(success);
    assert_eq!(fs::read_dir(&out_dir).unwrap().count(), 1);

    let (stdout, _, success) = run_snaptext(&config_path, None, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Records:          2"));

    let (_, _, success) = run_snaptext(&config_path, None, &["delete", "1"]);
    assert!(success);
    let (_, _, success) = run_snaptext(&config_path, None, &["delete", "1"]);
    assert!(!success, "second delete reports not found");

    let (stdout, _, _) = run_snaptext(&config_path, None, &["list"]);
    assert!(stdout.contains("1 record(s)"));
    assert!(!stdout.contains("receipt.png"));
}
