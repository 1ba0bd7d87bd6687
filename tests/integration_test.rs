// Integration tests for bookmark-manager-pro
// Run with: cargo test --test integration_test

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn run_cli(store: &Path, args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_bookmark-manager-pro"))
        .arg("--store")
        .arg(store)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (output.status.success(), stdout, stderr)
}

/// Pull the `(id: XXXX)` value out of a creation message.
fn created_id(stdout: &str) -> String {
    let start = stdout.find("(id: ").expect("no id in output") + "(id: ".len();
    let end = stdout[start..].find(')').expect("unterminated id") + start;
    stdout[start..end].to_string()
}

fn store_in(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("store.json")
}

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let (success, stdout, _) = run_cli(&store_in(&dir), &["--help"]);

    assert!(success);
    assert!(stdout.contains("add-bookmark"));
    assert!(stdout.contains("undo"));
    println!("✅ help works");
}

#[test]
fn test_add_and_show_tree() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let (success, stdout, stderr) = run_cli(&store, &["add-folder", "Work"]);
    assert!(success, "add-folder failed: {}", stderr);
    let folder = created_id(&stdout);

    let (success, stdout, _) = run_cli(&store, &["add-bookmark", "Rust", "https://www.rust-lang.org", "-p", &folder]);
    assert!(success);
    let bookmark = created_id(&stdout);

    let (success, stdout, _) = run_cli(&store, &["tree"]);
    assert!(success);
    assert!(stdout.contains("📁 Bookmarks [root] (1 items)"));
    assert!(stdout.contains(&format!("📁 Work [{}] (1 items)", folder)));
    assert!(stdout.contains(&format!("🔖 Rust [{}] https://www.rust-lang.org", bookmark)));

    assert!(store.exists());
    println!("✅ add-folder / add-bookmark / tree work");
}

#[test]
fn test_rm_then_undo_persists_across_runs() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let (_, stdout, _) = run_cli(&store, &["add-bookmark", "Docs", "https://doc.rust-lang.org"]);
    let bookmark = created_id(&stdout);

    let (success, _, _) = run_cli(&store, &["rm", &bookmark]);
    assert!(success);
    let (_, stdout, _) = run_cli(&store, &["tree"]);
    assert!(!stdout.contains(&bookmark));

    let (success, stdout, _) = run_cli(&store, &["undo"]);
    assert!(success);
    assert!(stdout.contains("deleted"));

    let (_, stdout, _) = run_cli(&store, &["tree"]);
    assert!(stdout.contains(&format!("🔖 Docs [{}]", bookmark)));

    // The only entry is spent in the undo direction now.
    let (success, _, _) = run_cli(&store, &["undo"]);
    assert!(!success);
    println!("✅ rm / undo work");
}

#[test]
fn test_mv_into_own_descendant_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let (_, stdout, _) = run_cli(&store, &["add-folder", "Parent"]);
    let parent = created_id(&stdout);
    let (_, stdout, _) = run_cli(&store, &["add-folder", "Child", "-p", &parent]);
    let child = created_id(&stdout);

    let (success, _, stderr) = run_cli(&store, &["mv", &parent, &child]);
    assert!(!success);
    assert!(stderr.contains(&parent));

    let (success, stdout, _) = run_cli(&store, &["validate"]);
    assert!(success);
    assert!(stdout.contains("All invariants hold"));
    println!("✅ mv cycle guard works");
}

#[test]
fn test_cp_creates_independent_copy() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let (_, stdout, _) = run_cli(&store, &["add-folder", "Source"]);
    let source = created_id(&stdout);
    run_cli(&store, &["add-bookmark", "One", "https://one.example", "-p", &source]);
    let (_, stdout, _) = run_cli(&store, &["add-folder", "Target"]);
    let target = created_id(&stdout);

    let (success, stdout, _) = run_cli(&store, &["cp", &source, &target]);
    assert!(success);
    let copy = created_id(&stdout);
    assert_ne!(copy, source);

    let (_, stdout, _) = run_cli(&store, &["analyze"]);
    assert!(stdout.contains("Duplicate URLs: 1"));
    println!("✅ cp works");
}

#[test]
fn test_profiles_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    run_cli(&store, &["add-folder", "Home stuff"]);
    let (success, _, _) = run_cli(&store, &["profile", "create", "Work"]);
    assert!(success);
    let (success, _, _) = run_cli(&store, &["profile", "switch", "Work"]);
    assert!(success);

    let (_, stdout, _) = run_cli(&store, &["tree"]);
    assert!(!stdout.contains("Home stuff"));

    let (_, stdout, _) = run_cli(&store, &["profile", "list"]);
    assert!(stdout.contains("* Work"));
    assert!(stdout.contains("  Default"));
    println!("✅ profiles work");
}
