//! Integration tests for the command-line interface

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn treemorph(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_treemorph"))
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

/// Two TypeScript files sharing the `area` function.
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("src")).unwrap();

    fs::write(
        dir.path().join("src/shapes.ts"),
        "export function area(w: number, h: number) {\n    return w * h;\n}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/main.ts"),
        "import { area } from './shapes';\nconsole.log(area(2, 3));\n",
    )
    .unwrap();

    dir
}

#[test]
fn test_rename_help() {
    let dir = TempDir::new().unwrap();
    let output = treemorph(&["rename", "--help"], dir.path());

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rename the symbol at an offset"));
}

#[test]
fn test_rename_across_directory() {
    let workspace = setup_test_workspace();
    let offset = "export function ".len().to_string();

    let output = treemorph(
        &[
            "rename",
            "src/shapes.ts",
            "--offset",
            &offset,
            "--to",
            "surface",
            "--dir",
            "src",
        ],
        workspace.path(),
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 occurrences in 2 files"));

    let shapes = fs::read_to_string(workspace.path().join("src/shapes.ts")).unwrap();
    let main = fs::read_to_string(workspace.path().join("src/main.ts")).unwrap();
    assert!(shapes.starts_with("export function surface("));
    assert_eq!(
        main,
        "import { surface } from './shapes';\nconsole.log(surface(2, 3));\n"
    );
}

#[test]
fn test_rename_dry_run_leaves_files() {
    let workspace = setup_test_workspace();
    let offset = "export function ".len().to_string();

    let output = treemorph(
        &[
            "rename",
            "src/shapes.ts",
            "--offset",
            &offset,
            "--to",
            "surface",
            "--dry-run",
            "--diff",
        ],
        workspace.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("+export function surface("));

    let shapes = fs::read_to_string(workspace.path().join("src/shapes.ts")).unwrap();
    assert!(shapes.contains("function area("));
}

#[test]
fn test_rename_json_report() {
    let workspace = setup_test_workspace();
    let offset = "import { ".len().to_string();

    let output = treemorph(
        &[
            "rename",
            "src/main.ts",
            "--offset",
            &offset,
            "--to",
            "computeArea",
            "--json",
            "--dry-run",
        ],
        workspace.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_end = stdout.rfind('}').unwrap() + 1;
    let report: serde_json::Value = serde_json::from_str(&stdout[..json_end]).unwrap();
    assert_eq!(report["old_name"], "area");
    assert_eq!(report["new_name"], "computeArea");
    assert_eq!(report["files"][0]["spans"].as_array().unwrap().len(), 2);
}

#[test]
fn test_replace_range() {
    let workspace = setup_test_workspace();
    let start = "export function area(w: number, h: number) {\n    return ".len();
    let end = start + "w * h".len();

    let output = treemorph(
        &[
            "replace",
            "src/shapes.ts",
            "--start",
            &start.to_string(),
            "--end",
            &end.to_string(),
            "--text",
            "h * w",
        ],
        workspace.path(),
    );

    assert!(output.status.success());
    let shapes = fs::read_to_string(workspace.path().join("src/shapes.ts")).unwrap();
    assert!(shapes.contains("return h * w;"));
}

#[test]
fn test_replace_invalid_range_fails() {
    let workspace = setup_test_workspace();

    let output = treemorph(
        &[
            "replace",
            "src/shapes.ts",
            "--start",
            "10",
            "--end",
            "100000",
            "--text",
            "x",
        ],
        workspace.path(),
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid byte range"));
}

#[test]
fn test_remove_parameter() {
    let workspace = setup_test_workspace();
    let offset = "export function area(w: number, ".len().to_string();

    let output = treemorph(
        &[
            "remove",
            "src/shapes.ts",
            "--offset",
            &offset,
            "--kind",
            "required_parameter",
        ],
        workspace.path(),
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let shapes = fs::read_to_string(workspace.path().join("src/shapes.ts")).unwrap();
    assert!(shapes.starts_with("export function area(w: number) {"));
}

#[test]
fn test_remove_last_import_removes_statement() {
    let workspace = setup_test_workspace();
    let offset = "import { ".len().to_string();

    let output = treemorph(
        &["remove", "src/main.ts", "--offset", &offset, "--kind", "import_specifier"],
        workspace.path(),
    );

    assert!(output.status.success());
    let main = fs::read_to_string(workspace.path().join("src/main.ts")).unwrap();
    assert_eq!(main, "console.log(area(2, 3));\n");
}

#[test]
fn test_nodes_with_pattern() {
    let workspace = setup_test_workspace();

    let output = treemorph(
        &["nodes", "src/main.ts", "--pattern", "area($A, $B)"],
        workspace.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("call_expression"));
    assert!(stdout.contains("area(2, 3)"));
}

#[test]
fn test_settings_file_is_honoured() {
    let workspace = setup_test_workspace();
    fs::write(workspace.path().join("treemorph.toml"), "indentation = 4\n").unwrap();

    let output = treemorph(&["nodes", "src/main.ts"], workspace.path());

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse settings TOML"));
}
