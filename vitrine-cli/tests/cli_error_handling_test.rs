use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const GOOD_SHADER: &str = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    fragColor = vec4(uv, 0.5 + 0.5 * sin(iTime), 1.0);
}
"#;

const BROKEN_SHADER: &str = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(undefinedThing, 1.0);
}
"#;

fn cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vitrine-cli"))
        .args(args)
        .output()
        .expect("Failed to run vitrine-cli")
}

fn write_config(dir: &Path, body: &str) -> String {
    let path = dir.join("gallery.toml");
    fs::write(&path, body).expect("Failed to write config");
    path.display().to_string()
}

const CONFIG: &str = r#"
[window]
width = 320
height = 240

[catalog]
paths = ["shaders"]
"#;

/// A gallery directory with two good entries and, optionally, a broken one.
fn gallery_dir(with_broken: bool) -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let shaders = dir.path().join("shaders");
    fs::create_dir(&shaders).unwrap();
    fs::write(shaders.join("gradient.glsl"), GOOD_SHADER).unwrap();

    let mut manifest = String::from(
        r#"
[[entry]]
key = "gradient"
name = "Gradient"
sort = 20
tags = ["basic"]
file = "gradient.glsl"

[[entry]]
key = "pulse"
name = "Pulse"
sort = 10
tags = ["basic", "animated"]
source = """
void mainImage(out vec4 c, in vec2 p) { c = vec4(vec3(0.5 + 0.5 * sin(iTime)), 1.0); }
"""
"#,
    );
    if with_broken {
        fs::write(shaders.join("broken.glsl"), BROKEN_SHADER).unwrap();
        manifest.push_str(
            r#"
[[entry]]
key = "broken"
sort = 30
file = "broken.glsl"
"#,
        );
    }
    fs::write(shaders.join("catalog.toml"), manifest).unwrap();

    let config = write_config(dir.path(), CONFIG);
    (dir, config)
}

#[test]
fn test_cli_handles_missing_config_file() {
    let output = cli(&["list", "non_existent_config.toml"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "got: {}", stderr);
}

#[test]
fn test_cli_rejects_directory_as_config() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli(&["check", &dir.path().display().to_string()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_handles_invalid_toml_syntax() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[window
width = 800  // missing closing bracket and invalid comment syntax
"#,
    );
    let output = cli(&["list", &config]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("parse"), "got: {}", stderr);
}

#[test]
fn test_cli_handles_invalid_config_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[window]
width = 0
height = 600

[catalog]
paths = ["shaders"]
"#,
    );
    let output = cli(&["list", &config]);
    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Window dimensions"), "got: {}", stderr);
}

#[test]
fn test_cli_handles_missing_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), CONFIG);
    let output = cli(&["list", &config]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_cli_reports_duplicate_keys_with_both_manifests() {
    let (dir, config) = gallery_dir(false);
    fs::write(
        dir.path().join("shaders").join("more.toml"),
        r#"
[[entry]]
key = "gradient"
source = "void mainImage(out vec4 c, in vec2 p) { c = vec4(1.0); }"
"#,
    )
    .unwrap();

    let output = cli(&["list", &config]);
    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gradient"), "got: {}", stderr);
    assert!(stderr.contains("catalog.toml"), "got: {}", stderr);
    assert!(stderr.contains("more.toml"), "got: {}", stderr);
}

#[test]
fn test_cli_list_is_sorted() {
    let (_dir, config) = gallery_dir(false);
    let output = cli(&["list", &config]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let pulse = stdout.find("pulse").expect("pulse listed");
    let gradient = stdout.find("gradient").expect("gradient listed");
    assert!(pulse < gradient, "entries should follow sort order: {}", stdout);
}

#[test]
fn test_cli_list_json_with_tag_filter() {
    let (_dir, config) = gallery_dir(false);
    let output = cli(&["list", &config, "--json", "--tag", "animated"]);
    assert!(output.status.success());

    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["key"], "pulse");
    assert_eq!(entries[0]["api"], "webgl2");
    assert_eq!(entries[0]["precision"], "highp");
}

#[test]
fn test_cli_check_passes_good_catalog() {
    let (_dir, config) = gallery_dir(false);
    let output = cli(&["check", &config]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("2 of 2 entries passed"));
}

#[test]
fn test_cli_check_names_broken_entry() {
    let (_dir, config) = gallery_dir(true);
    let output = cli(&["check", &config]);
    assert_eq!(output.status.code(), Some(7));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL  broken"), "stdout: {}", stdout);
    assert!(stdout.contains("ok    gradient"), "stdout: {}", stdout);
    assert!(stdout.contains("2 of 3 entries passed"), "stdout: {}", stdout);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("'broken'"), "stderr: {}", stderr);
}

#[test]
fn test_cli_no_arguments_shows_usage() {
    let output = cli(&[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "got: {}", stderr);
}

#[test]
fn test_cli_checks_bundled_gallery() {
    let config = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("gallery")
        .join("gallery.toml");
    let output = cli(&["check", &config.display().to_string()]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        stdout,
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("4 of 4 entries passed"), "stdout: {}", stdout);
}
