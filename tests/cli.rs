//! CLI integration tests
//!
//! These run the compiled binary against projects laid out in temp directories and
//! check exit codes, printed output and the files written.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn toolforge_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_toolforge"))
}

fn run(args: &[&str]) -> Output {
    Command::new(toolforge_bin())
        .args(args)
        .env_remove("TOOLFORGE_OUTPUT_DIR")
        .env_remove("TOOLFORGE_TOOLS_DIR")
        .env_remove("TOOLFORGE_CONNECTORS_DIR")
        .env_remove("TOOLFORGE_PROFILE")
        .env_remove("TOOLFORGE_STRICT_DEPENDENCIES")
        .output()
        .expect("Failed to execute toolforge")
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn tool(name: &str) -> String {
    format!(
        r#"export const metadata = {{
  name: "{}",
  description: "A tool",
  version: "1.0.0",
  inputSchema: {{ type: "object" }},
}};
export async function handler(input) {{ return input; }}
"#,
        name
    )
}

const WEATHER: &str = r#"
"""
Weather connector.

:credential api_key WEATHER_API_KEY: Provider key
"""

metadata = {
    "name": "weather",
    "description": "Weather data",
    "version": "0.3.0",
    "type": "http",
    "authentication": {"type": "api_key"},
}
"#;

fn sample_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write(dir.path(), "tools/echo.ts", &tool("echo"));
    write(dir.path(), "connectors/weather.py", WEATHER);
    dir
}

fn root_arg(dir: &TempDir) -> &str {
    dir.path().to_str().unwrap()
}

#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["build", "validate", "manifest", "credentials", "config"] {
        assert!(stdout.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("toolforge"));
}

#[test]
fn test_validate_valid_project() {
    let dir = sample_project();
    let output = run(&["validate", root_arg(&dir)]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("echo"));
    assert!(stdout.contains("weather"));
    assert!(stdout.contains("2 module(s) valid"));
}

#[test]
fn test_validate_duplicate_names_exits_with_validation_code() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tools/one/search.ts", &tool("search"));
    write(dir.path(), "tools/two/search.js", &tool("search"));

    let output = run(&["validate", root_arg(&dir), "--format", "json"]);
    assert_eq!(output.status.code(), Some(2));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["validation"]["valid"], false);
    let message = value["validation"]["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains("search.ts"));
    assert!(message.contains("search.js"));
}

#[test]
fn test_nonexistent_project_fails() {
    let output = run(&["validate", "/nonexistent/path/12345"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a directory"));
}

#[test]
fn test_manifest_json() {
    let dir = sample_project();
    let output = run(&["manifest", root_arg(&dir), "-f", "json"]);
    assert!(output.status.success());

    let manifest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["tools"][0]["name"], "echo");
    assert_eq!(manifest["connectors"][0]["name"], "weather");
    assert!(manifest["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c == "http-integration"));
}

#[test]
fn test_credentials_yaml() {
    let dir = sample_project();
    let output = run(&["credentials", root_arg(&dir), "--format", "yaml"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("WEATHER_API_KEY"));
    assert!(stdout.contains("weather"));
}

#[test]
fn test_config_prints_placeholders_only() {
    let dir = sample_project();
    let output = Command::new(toolforge_bin())
        .args(["config", root_arg(&dir), "--profile", "production"])
        .env("WEATHER_API_KEY", "do-not-leak")
        .output()
        .expect("Failed to execute toolforge");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("${WEATHER_API_KEY}"));
    assert!(!stdout.contains("do-not-leak"));
    assert!(!dir.path().join("build").exists());
}

#[test]
fn test_build_dry_run_writes_context() {
    let dir = sample_project();
    let output = run(&["build", root_arg(&dir), "--dry-run", "--image", "acme/server", "-f", "json"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["dryRun"], true);
    assert_eq!(summary["strategy"], "multi-stage");

    let build = dir.path().join("build");
    for artifact in [
        "generated/manifest.json",
        "config/config.yaml",
        "Dockerfile",
        ".dockerignore",
        "requirements.txt",
        "tools/echo.ts",
        "connectors/weather.py",
    ] {
        assert!(build.join(artifact).exists(), "missing {}", artifact);
    }
}

#[test]
fn test_build_custom_output_and_resume() {
    let dir = sample_project();
    let out = TempDir::new().unwrap();
    let out_arg = out.path().to_str().unwrap();

    let first = run(&["build", root_arg(&dir), "--dry-run", "-o", out_arg, "-f", "json"]);
    assert!(first.status.success());

    let second = run(&[
        "build",
        root_arg(&dir),
        "--dry-run",
        "--resume",
        "-o",
        out_arg,
        "-f",
        "json",
    ]);
    assert!(second.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&second.stdout).unwrap();
    let manifest_step = summary["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["step"] == "manifest")
        .unwrap();
    assert_eq!(manifest_step["outcome"]["status"], "resumed");
}

#[test]
fn test_tag_without_image_is_rejected() {
    let output = run(&["build", "--tag", "1.0"]);
    assert!(!output.status.success());
}
