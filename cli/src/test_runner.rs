//! Runner for `.test.md` fixtures: TOML frontmatter between `---` lines,
//! followed by the document to execute.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use engine::SessionConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    pub description: Option<String>,

    /// Text the rendered document must contain.
    pub expect_output: Option<String>,

    /// Compare `expect_output` against the whole rendered document
    /// (both trimmed) instead of searching for it.
    pub exact: bool,

    /// The run must fail with an error whose message contains this.
    pub expect_error: Option<String>,

    /// The document must fail to parse.
    pub expect_parse_error: bool,

    /// Lines run before the document, after the configured prelude.
    pub prelude: Vec<String>,
}

/// Split a `.test.md` file into its config and document source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let toml_str = after_open[..close].trim_end_matches('\r');
    let rest = &after_open[close + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("?")
        })
    }
}

fn run_single_test(path: &Path, base: &SessionConfig) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return failed(path, None, format!("cannot read file: {}", e)),
    };
    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return failed(path, None, format!("frontmatter error: {}", e)),
    };
    debug!(path = %path.display(), "running fixture");

    let outcome = match check_fixture(&config, source, base) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

fn failed(path: &Path, description: Option<String>, reason: String) -> TestResult {
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    }
}

/// Parse and execute one fixture. Returns the failure reason, if any.
fn check_fixture(config: &TestConfig, source: &str, base: &SessionConfig) -> Option<String> {
    let parsed = doctree::Parser::new(source.to_string(), 0).parse();
    if config.expect_parse_error {
        return match parsed {
            Err(_) => None,
            Ok(_) => Some("expected parse error, but parsing succeeded".into()),
        };
    }
    let document = match parsed {
        Ok(document) => document,
        Err(errors) => {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| match e.notes.first() {
                    Some(note) => format!("{}: {}", e.message, note),
                    None => e.message.clone(),
                })
                .collect();
            return Some(format!("unexpected parse error: {}", messages.join("; ")));
        }
    };

    let mut session = base.clone();
    session.prelude.extend(config.prelude.iter().cloned());
    let result = engine::execute_document(document, &session);

    match (&config.expect_error, result) {
        (Some(expected), Err(err)) => {
            let message = err.to_string();
            (!message.contains(expected.as_str())).then(|| {
                format!("expected error containing \"{}\", got: {}", expected, message)
            })
        }
        (Some(expected), Ok(_)) => Some(format!(
            "expected error containing \"{}\", but execution succeeded",
            expected
        )),
        (None, Err(err)) => Some(format!("unexpected error: {}", err)),
        (None, Ok(document)) => {
            let rendered = document.to_string();
            let expected = config.expect_output.as_deref()?;
            check_output(&rendered, expected, config.exact)
        }
    }
}

fn check_output(actual: &str, expected: &str, exact: bool) -> Option<String> {
    let (actual, expected) = (actual.trim(), expected.trim());
    let matched = if exact {
        actual == expected
    } else {
        actual.contains(expected)
    };
    if matched {
        return None;
    }
    let relation = if exact { "expected" } else { "expected to contain" };
    Some(format!(
        "output mismatch\n  {}:\n{}\n  actual:\n{}",
        relation,
        indent(expected),
        indent(actual)
    ))
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// `.test.md` files grouped by subfolder relative to `root`, sorted. Files
/// directly in `root` get the category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.md"));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() {
        "(root)"
    } else {
        category
    }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// Keep the categories named in `requested` (and their subfolders).
fn select_categories(
    all: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all;
    }
    let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
    for req in requested {
        let req = req.trim_matches('/');
        let prefix = format!("{}/", req);
        if !all.keys().any(|cat| cat == req || cat.starts_with(&prefix)) {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                available.join(", ")
            );
        }
    }
    all.into_iter()
        .filter(|(cat, _)| {
            requested.iter().any(|req| {
                let req = req.trim_matches('/');
                cat == req || cat.starts_with(&format!("{}/", req))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Run all `.test.md` files under `path` (or a single file). Returns the
/// process exit code: 0 when everything passed, 1 otherwise.
pub fn run_tests(
    path: &Path,
    base: &SessionConfig,
    no_color: bool,
    categories: &[String],
) -> i32 {
    let style = Style { no_color };

    let groups = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        let selected = select_categories(all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
    };
    let show_headers = !path.is_file();

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &groups {
        if show_headers {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file, base);
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("ok", "32"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}
