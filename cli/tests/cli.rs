use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn livedoc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_livedoc"))
        .arg("--no-color")
        .args(args)
        .output()
        .expect("failed to run livedoc")
}

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn document_without_code_is_rendered() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "doc.md", "# Title\n\nSome *text*.\n");
    let out = livedoc(&["run", arg(&file)]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "# Title\n\nSome *text*.\n");
}

#[test]
fn bare_file_means_run() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "doc.md", "Plain.\n");
    let out = livedoc(&[arg(&file), "--check"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("parsed successfully"));
}

#[test]
fn output_file() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "doc.md", "Hello.\n");
    let target = dir.path().join("out.md");
    let out = livedoc(&["run", arg(&file), "-o", arg(&target)]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "");
    assert_eq!(fs::read_to_string(&target).unwrap(), "Hello.\n");
}

#[test]
fn ast_dump() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "doc.md", "`x`{.python}\n");
    let out = livedoc(&["run", arg(&file), "--ast"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Code"));
    assert!(stdout(&out).contains("\"python\""));
}

#[test]
fn front_matter_error_is_reported() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "doc.md", "+++\ntitle = [\n+++\n\nBody\n");
    let out = livedoc(&["run", arg(&file)]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("invalid front matter"));
    assert_eq!(stdout(&out), "");
}

#[test]
fn missing_file() {
    let out = livedoc(&["run", "no/such/file.md"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot read"));
}

#[test]
fn invalid_config() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "doc.md", "Text.\n");
    let config = write(&dir, "session.toml", "prompt = \"\"\n");
    let out = livedoc(&["run", arg(&file), "--config", arg(&config)]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("cannot load config"));
}

#[test]
fn missing_interpreter_writes_no_output() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "doc.md", "`1+1`{.python}\n");
    let out = livedoc(&["run", arg(&file), "--python", "no-such-interpreter-5c1e"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("failed to start interpreter"));
    assert_eq!(stdout(&out), "");
}

#[test]
fn executes_python() {
    if !python_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "doc.md",
        "```python\nn = 7\n```\n\nSquare: `n * n`{.python}\n",
    );
    let out = livedoc(&["run", arg(&file)]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "Square: 49\n");
}

// ---------------------------------------------------------------------------
// test
// ---------------------------------------------------------------------------

const PASSING: &str = "---\ndescription = \"renders text\"\nexpect_output = \"Hello\"\n---\nHello *there*.\n";
const FAILING: &str = "---\nexpect_output = \"Goodbye\"\n---\nHello.\n";

#[test]
fn fixture_pass_and_fail() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a/pass.test.md", PASSING);
    let out = livedoc(&["test", arg(dir.path())]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(stderr(&out).contains("PASS  renders text"));

    write(&dir, "b/fail.test.md", FAILING);
    let out = livedoc(&["test", arg(dir.path())]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("FAIL  fail"));
    assert!(stderr(&out).contains("1 passed, 1 failed (of 2)"));
}

#[test]
fn fixture_categories() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a/pass.test.md", PASSING);
    write(&dir, "b/fail.test.md", FAILING);

    let out = livedoc(&["test", arg(dir.path()), "-c", "a"]);
    assert!(out.status.success(), "{}", stderr(&out));

    let out = livedoc(&["test", arg(dir.path()), "--list-categories"]);
    assert!(stderr(&out).contains("a (1 tests)"));
    assert!(stderr(&out).contains("b (1 tests)"));
}

#[test]
fn exact_output_fixture() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "exact.test.md",
        "---\nexpect_output = \"Hello *there*.\"\nexact = true\n---\nHello *there*.\n",
    );
    let out = livedoc(&["test", arg(&file)]);
    assert!(out.status.success(), "{}", stderr(&out));
}

#[test]
fn fixture_without_frontmatter_fails() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "bad.test.md", "Hello.\n");
    let out = livedoc(&["test", arg(&file)]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("frontmatter error"));
}

#[test]
fn bundled_fixtures() {
    if !python_available() {
        return;
    }
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let out = livedoc(&["test", arg(&fixtures)]);
    assert!(out.status.success(), "{}", stderr(&out));
}
