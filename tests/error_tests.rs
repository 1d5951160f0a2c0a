//! Error scenario integration tests

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn smart_ledger_bin(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_smart-ledger"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("SMART_LEDGER_BACKEND_URL")
        .env_remove("SMART_LEDGER_ANON_KEY")
        .env_remove("SMART_LEDGER_DATABASE")
        .env_remove("SMART_LEDGER_SERVICE_KEY")
        .env_remove("STRIPE_SECRET_KEY")
        .env_remove("GROQ_API_KEY");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    smart_ledger_bin(home)
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn usage_without_session_fails() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["usage"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(
        stderr.contains("Not signed in"),
        "Expected error about missing session, got: {}",
        stderr
    );
}

#[test]
fn sync_without_payment_key_names_the_setting() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["sync"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(
        stderr.contains("payment_api_key") && stderr.contains("STRIPE_SECRET_KEY"),
        "Expected error about missing payment key, got: {}",
        stderr
    );
}

#[test]
fn parse_without_ai_key_names_the_setting() {
    let home = TempDir::new().unwrap();
    let output = smart_ledger_bin(home.path())
        .args([
            "session",
            "set",
            "--user-id",
            "user-1",
            "--email",
            "mario@example.com",
        ])
        .env("SMART_LEDGER_ACCESS_TOKEN", "at")
        .env("SMART_LEDGER_REFRESH_TOKEN", "rt")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "sign-in failed: {}", stderr(&output));

    let output = run(home.path(), &["parse", "Cena fuori 45 euro"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ai_api_key"));
}

#[test]
fn remote_sync_requires_service_key() {
    let home = TempDir::new().unwrap();
    let output = smart_ledger_bin(home.path())
        .args(["--store", "remote", "sync"])
        .env("STRIPE_SECRET_KEY", "sk_test_123")
        .env("SMART_LEDGER_ANON_KEY", "anon-key")
        .env("SMART_LEDGER_BACKEND_URL", "https://example.supabase.co")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(
        stderr.contains("service_key") && stderr.contains("SMART_LEDGER_SERVICE_KEY"),
        "Expected error about missing service key, got: {}",
        stderr
    );
}

#[test]
fn remote_store_requires_backend_url() {
    let home = TempDir::new().unwrap();
    let output = smart_ledger_bin(home.path())
        .args(["--store", "remote", "--service-key", "service-role-key", "sync"])
        .env("STRIPE_SECRET_KEY", "sk_test_123")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("backend_url"));
}

#[test]
fn config_get_unknown_key() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["config", "get", "unknown_key"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = stderr(&output);
    assert!(
        stderr.contains("Unknown") && stderr.contains("Valid keys"),
        "Expected error about unknown key, got: {}",
        stderr
    );
}

#[test]
fn config_set_invalid_interval() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["config", "set", "sync_interval", "often"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("sync_interval"));
}

#[test]
fn config_set_invalid_store() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["config", "set", "store", "mysql"]);

    assert!(!output.status.success());
}

#[test]
fn watch_rejects_bad_interval() {
    let home = TempDir::new().unwrap();
    let output = smart_ledger_bin(home.path())
        .args(["watch", "--interval", "soon"])
        .env("STRIPE_SECRET_KEY", "sk_test_123")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("interval"));
}

#[test]
fn transcribe_missing_file() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["transcribe", "/nonexistent/note.webm"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to read"));
}

#[test]
fn webhook_rejects_malformed_payload() {
    let home = TempDir::new().unwrap();
    let event = home.path().join("event.json");
    std::fs::write(&event, "not json").unwrap();

    let output = smart_ledger_bin(home.path())
        .arg("webhook")
        .arg(&event)
        .env("STRIPE_SECRET_KEY", "sk_test_123")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unknown_subcommand() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["unknown-command"]);

    assert!(!output.status.success());
}
