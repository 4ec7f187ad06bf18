use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ephub_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ephub");
    path
}

const COLLECTION: &str = r#"{
  "info": { "name": "Accounts", "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json" },
  "item": [
    {
      "name": "listUsers",
      "request": { "method": "GET", "url": { "raw": "{{base}}/users?page=1&size=20" } }
    },
    {
      "name": "Admin",
      "item": [
        {
          "name": "createUser",
          "request": { "method": "POST", "url": { "raw": "{{base}}/users" } }
        },
        {
          "name": "deleteUser",
          "request": { "method": "DELETE", "url": "{{base}}/users/:id" }
        }
      ]
    },
    { "name": "broken", "request": { "url": "{{base}}/nothing" } }
  ]
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    fs::write(root.join("accounts.postman.json"), COLLECTION).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/hub.sqlite"

[model]
dir = "{root}/model"

[embedding]
provider = "hashing"
dims = 256

[retrieval]
default_top_k = 3

[server]
bind = "127.0.0.1:7341"
train_on_startup = false
"#,
        root = root.display()
    );

    let config_path = config_dir.join("ephub.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ephub(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ephub_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ephub binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn import_accounts(tmp: &TempDir, config: &Path) {
    let file = tmp.path().join("accounts.postman.json");
    let (stdout, stderr, success) = run_ephub(
        config,
        &[
            "import",
            file.to_str().unwrap(),
            "--module",
            "accounts",
            "--created-by",
            "integration",
        ],
    );
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("endpoints: 3"), "unexpected output: {}", stdout);
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, success) = run_ephub(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));

    let (_, stderr, success) = run_ephub(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);

    assert!(tmp.path().join("data/hub.sqlite").exists());
    assert!(tmp.path().join("model").is_dir());
}

#[test]
fn test_train_without_modules_fails() {
    let (_tmp, config) = setup_test_env();
    run_ephub(&config, &["init"]);

    let (_, stderr, success) = run_ephub(&config, &["train"]);
    assert!(!success);
    assert!(stderr.contains("No modules found"), "stderr: {}", stderr);
}

#[test]
fn test_search_before_training_fails() {
    let (_tmp, config) = setup_test_env();
    run_ephub(&config, &["init"]);

    let (_, stderr, success) = run_ephub(&config, &["search", "users"]);
    assert!(!success);
    assert!(stderr.contains("not trained"), "stderr: {}", stderr);
}

#[test]
fn test_disabled_provider_refuses_train_and_search() {
    let (tmp, config) = setup_test_env();
    let disabled = fs::read_to_string(&config)
        .unwrap()
        .replace("provider = \"hashing\"", "provider = \"disabled\"");
    fs::write(&config, disabled).unwrap();
    run_ephub(&config, &["init"]);
    import_accounts(&tmp, &config);

    let (_, stderr, success) = run_ephub(&config, &["train"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"), "stderr: {}", stderr);

    let (_, stderr, success) = run_ephub(&config, &["search", "users"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"), "stderr: {}", stderr);
}

#[test]
fn test_import_then_list_modules() {
    let (tmp, config) = setup_test_env();
    run_ephub(&config, &["init"]);
    import_accounts(&tmp, &config);

    let (stdout, stderr, success) = run_ephub(&config, &["modules"]);
    assert!(success, "modules failed: {}", stderr);
    assert!(stdout.contains("accounts"));
    assert!(stdout.contains(" 3 "), "unexpected output: {}", stdout);
}

#[test]
fn test_full_pipeline_train_search_export() {
    let (tmp, config) = setup_test_env();
    run_ephub(&config, &["init"]);
    import_accounts(&tmp, &config);

    let (stdout, stderr, success) = run_ephub(&config, &["train"]);
    assert!(success, "train failed: {}", stderr);
    assert!(stdout.contains("Model trained successfully with 3 endpoints."));

    let current = fs::read_to_string(tmp.path().join("model/CURRENT")).unwrap();
    let generation = tmp.path().join("model").join(current.trim());
    for file in ["index.bin", "metadata.json", "embeddings.npy", "manifest.json"] {
        assert!(generation.join(file).is_file(), "missing {}", file);
    }

    let (stdout, stderr, success) = run_ephub(&config, &["search", "delete user"]);
    assert!(success, "search failed: {}", stderr);
    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. ["), "unexpected output: {}", stdout);
    assert!(first.contains("DELETE {{base}}/users/:id"), "unexpected output: {}", stdout);

    let id = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("id: "))
        .expect("search output should include an id")
        .to_string();

    let out_file = tmp.path().join("out/deleteUser.json");
    let (_, stderr, success) = run_ephub(
        &config,
        &["export", &id, "--output", out_file.to_str().unwrap()],
    );
    assert!(success, "export failed: {}", stderr);
    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out_file).unwrap()).unwrap();
    assert_eq!(exported["name"], "deleteUser");
    assert_eq!(exported["request"]["method"], "DELETE");
}

#[test]
fn test_export_unknown_id_fails() {
    let (_tmp, config) = setup_test_env();
    run_ephub(&config, &["init"]);

    let (_, stderr, success) = run_ephub(&config, &["export", "does-not-exist"]);
    assert!(!success);
    assert!(stderr.contains("Endpoint not found"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(
        &bad,
        "[db]\npath = \"x.sqlite\"\n[model]\ndir = \"m\"\n[retrieval]\ndefault_top_k = 0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_ephub(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("default_top_k"), "stderr: {}", stderr);
}
