use std::fs;
use std::process::Command;

fn binary_output(args: &[&str]) -> std::process::Output {
    let path = env!("CARGO_BIN_EXE_dupluxy-dump");
    Command::new(path)
        .args(args)
        .env_remove("DUPLUXY_LOG")
        .output()
        .unwrap_or_else(|error| panic!("failed to run {}: {}", path, error))
}

#[test]
fn dump_help_lists_usage() {
    let output = binary_output(&["--help"]);
    assert!(output.status.success(), "--help should succeed");
    assert!(output.stderr.is_empty());
    let stdout = String::from_utf8(output.stdout).expect("stdout is UTF-8");
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--exclude-by-attribute"));
}

#[test]
fn dump_rejects_unknown_flag() {
    let output = binary_output(&["--definitely-not-a-flag", "."]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn dump_prints_json_lines() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir(temp.path().join("dir")).expect("create dir");
    fs::write(temp.path().join("dir/file"), b"payload").expect("write file");

    let output = binary_output(&[temp.path().to_str().expect("utf-8 path")]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout is UTF-8");
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["size"], 7);
    assert_eq!(lines[0]["path"], serde_json::json!(b"dir".to_vec()));
}
