use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use wiki_migrate::{db, schema};

fn wikimig_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("wikimig");
    path
}

const FIXTURE: &[&str] = &[
    "INSERT INTO auth_user (id, username) VALUES (1, 'alice'), (2, 'bob'), (3, 'mdnwebdocs-bot')",
    r#"INSERT INTO wiki_document
        (id, title, slug, locale, is_redirect, html, modified, parent_id, current_revision_id, deleted)
     VALUES
        (1, 'HTML', 'Web/HTML', 'en-US', 0, '<p>HTML</p>', '2020-05-01 12:00:00', NULL, 3, 0),
        (2, 'CSS', 'Web/CSS', 'en-US', 0, '<p>CSS</p>', '2020-06-01 08:30:00', NULL, 4, 0),
        (3, 'Old HTML', 'Old/HTML', 'en-US', 1,
            'REDIRECT <a class="redirect" href="/en-US/docs/Web/HTML">HTML</a>',
            '2019-01-01 00:00:00', NULL, 6, 0),
        (4, 'Old', 'Archive/Old', 'en-US', 0, '<p>old</p>', '2015-01-01 00:00:00', NULL, 7, 0),
        (5, 'HTML (fr)', 'Web/HTML', 'fr', 0, '<p>HTML fr</p>', '2020-07-01 00:00:00', 3, 5, 0),
        (6, 'Deleted', 'Web/Deleted', 'en-US', 0, '<p>gone</p>', '2020-01-01 00:00:00', NULL, 8, 1),
        (7, 'Draft', 'Web/Draft', 'en-US', 0, '<p>draft</p>', '2020-01-01 00:00:00', NULL, NULL, 0),
        (8, 'Empty', 'Web/Empty', 'en-US', 0, '', '2020-01-01 00:00:00', NULL, 9, 0)"#,
    r#"INSERT INTO wiki_revision (id, document_id, creator_id, created) VALUES
        (1, 1, 1, '2020-01-01 00:00:00'),
        (2, 1, 2, '2020-02-01 00:00:00'),
        (3, 1, 3, '2020-03-01 00:00:00'),
        (4, 2, 2, '2020-06-01 08:30:00'),
        (5, 5, 1, '2020-07-01 00:00:00')"#,
];

fn seed(db_path: &Path) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let pool = db::connect_path(db_path, true).await.unwrap();
        schema::create_legacy_schema(&pool).await.unwrap();
        for statement in FIXTURE {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool.close().await;
    });
}

fn setup_test_env(seeded: bool) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let db_path = root.join("data/wiki.sqlite");
    if seeded {
        seed(&db_path);
    }

    let config_content = format!(
        r#"[db]
path = "{root}/data/wiki.sqlite"

[output]
content_root = "{root}/content"
translated_root = "{root}/translated"

[migration]
max_open_files = 4
"#,
        root = root.display()
    );

    let config_path = config_dir.join("wikimig.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_wikimig(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = wikimig_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run wikimig binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_schema_idempotent() {
    let (_tmp, config_path) = setup_test_env(false);

    let (stdout, stderr, success) = run_wikimig(&config_path, &["schema"]);
    assert!(success, "schema failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Legacy schema created"));

    let (_, _, success) = run_wikimig(&config_path, &["schema"]);
    assert!(success, "Second schema run failed (not idempotent)");
}

#[test]
fn test_count() {
    let (_tmp, config_path) = setup_test_env(true);

    let (stdout, stderr, success) = run_wikimig(&config_path, &["count"]);
    assert!(success, "count failed: stdout={}, stderr={}", stdout, stderr);
    let line = |locale: &str| {
        stdout
            .lines()
            .find(|l| l.trim_start().starts_with(locale))
            .map(|l| l.split_whitespace().collect::<Vec<_>>())
    };
    assert_eq!(line("en-US"), Some(vec!["en-US", "4"]));
    assert_eq!(line("fr"), Some(vec!["fr", "1"]));
    assert_eq!(line("total"), Some(vec!["total", "5"]));
}

#[test]
fn test_run_writes_locale_files() {
    let (tmp, config_path) = setup_test_env(true);
    let root = tmp.path();

    let (stdout, stderr, success) = run_wikimig(&config_path, &["run"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Documents:            5"));
    assert!(stdout.contains("Content:              3"));

    let en = read_json(&root.join("content/en-us/_wikihistory.json"));
    let keys: Vec<_> = en.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["Web/CSS", "Web/HTML"]);
    assert_eq!(en["Web/HTML"]["modified"], "2020-05-01T12:00:00.000Z");
    assert_eq!(en["Web/HTML"]["contributors"], serde_json::json!(["bob", "alice"]));
    assert_eq!(en["Web/CSS"]["contributors"], serde_json::json!(["bob"]));

    let fr = read_json(&root.join("translated/fr/_wikihistory.json"));
    assert_eq!(fr["Web/HTML"]["contributors"], serde_json::json!(["alice"]));

    let translations = read_json(&root.join("translated/fr/_translations.json"));
    assert_eq!(translations["Web/HTML"]["translation_of"], "Web/HTML");
    assert_eq!(translations["Web/HTML"]["translation_of_original"], "Old/HTML");

    let redirects = fs::read_to_string(root.join("content/en-us/_redirects.txt")).unwrap();
    assert_eq!(redirects, "/en-US/docs/Old/HTML\t/en-US/docs/Web/HTML\n");
}

#[test]
fn test_run_locale_filter() {
    let (tmp, config_path) = setup_test_env(true);

    let (stdout, stderr, success) = run_wikimig(&config_path, &["run", "--locale", "fr"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(tmp.path().join("translated/fr/_wikihistory.json").exists());
    assert!(!tmp.path().join("content/en-us").exists());
}

#[test]
fn test_start_clean_refuses_overwrite() {
    let (_tmp, config_path) = setup_test_env(true);

    let (_, _, success) = run_wikimig(&config_path, &["run"]);
    assert!(success, "First run failed");

    let (_, stderr, success) = run_wikimig(&config_path, &["run", "--start-clean"]);
    assert!(!success, "start-clean run should refuse existing output");
    assert!(stderr.contains("refusing to overwrite"));
}

#[test]
fn test_redirects_prints_final_destinations() {
    let (_tmp, config_path) = setup_test_env(true);

    let (stdout, stderr, success) = run_wikimig(&config_path, &["redirects"]);
    assert!(success, "redirects failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout, "/en-US/docs/Old/HTML\t/en-US/docs/Web/HTML\n");
}

#[test]
fn test_contributions_csv() {
    let (_tmp, config_path) = setup_test_env(true);

    let (stdout, stderr, success) = run_wikimig(&config_path, &["contributions"]);
    assert!(success, "contributions failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(
        stdout,
        "LOCALE,SLUG,USERNAME,CREATED\n\
         en-US,Web/CSS,bob,2020-06-01T08:30:00.000Z\n\
         en-US,Web/HTML,bob,2020-02-01T00:00:00.000Z\n\
         en-US,Web/HTML,alice,2020-01-01T00:00:00.000Z\n\
         fr,Web/HTML,alice,2020-07-01T00:00:00.000Z\n"
    );
}

#[test]
fn test_unknown_locale_rejected() {
    let (_tmp, config_path) = setup_test_env(true);

    let (_, stderr, success) = run_wikimig(&config_path, &["run", "--locale", "xx"]);
    assert!(!success);
    assert!(stderr.contains("Unknown locale"));
}

#[test]
fn test_missing_database_fails() {
    let (_tmp, config_path) = setup_test_env(false);

    let (_, stderr, success) = run_wikimig(&config_path, &["run"]);
    assert!(!success, "run without a database should fail");
    assert!(stderr.contains("Failed to connect"));
}
