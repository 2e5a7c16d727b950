// tests/integration_test.rs
use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--bin", "git-autodeploy", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_git_autodeploy_help() {
    let output = run(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("git-autodeploy"));
    assert!(stdout.contains("Coordinate component versions"));
}

#[test]
fn test_version_command_prints_views() {
    let output = run(&["version", "12.9.1-rc2-ee"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("12-9-stable-ee"));
    assert!(stdout.contains("12.9.1+rc2.ee.0"));
}

#[test]
fn test_version_command_rejects_garbage() {
    let output = run(&["version", "not-a-version"]);
    assert!(!output.status.success());
}

#[test]
fn test_branch_name_command() {
    let output = run(&["branch-name", "--milestone", "12.1", "--date", "2019-07-02"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), "12-1-auto-deploy-20190702");
}

#[test]
fn test_resolve_against_missing_repositories_fails() {
    let root = tempfile::tempdir().unwrap();
    let config = root.path().join("autodeploy.toml");
    std::fs::write(
        &config,
        format!("[repositories]\nroot = {:?}\n", root.path().display().to_string()),
    )
    .unwrap();

    let output = run(&[
        "--config",
        config.to_str().unwrap(),
        "resolve",
        "--commit",
        "36b70d9ce7c73ca001be48727d35d49813d2cc4f",
    ]);

    assert!(!output.status.success());
}
