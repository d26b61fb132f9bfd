use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use doctree::{Attr, Block, Document, Inline, MetaValue, Parser};
use engine::{ExecError, Executor, Launcher, Runner, execute_document_with};

// ---------------------------------------------------------------------------
// Scripted runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Call {
    lines: Vec<String>,
    echo: bool,
    repl: bool,
}

#[derive(Debug, Default)]
struct Log {
    launches: usize,
    closes: usize,
    calls: Vec<Call>,
}

/// Answers each batch of lines from a fixed table. Echoed runs return the
/// source followed by the answer.
#[derive(Default)]
struct Script {
    outputs: HashMap<String, String>,
    fail_on: Option<String>,
    refuse_preflight: bool,
    log: Rc<RefCell<Log>>,
}

impl Script {
    fn new(outputs: &[(&str, &str)]) -> Self {
        Script {
            outputs: outputs
                .iter()
                .map(|(code, out)| (code.to_string(), out.to_string()))
                .collect(),
            ..Script::default()
        }
    }

    fn launches(&self) -> usize {
        self.log.borrow().launches
    }

    fn closes(&self) -> usize {
        self.log.borrow().closes
    }

    fn calls(&self) -> Vec<Call> {
        self.log.borrow().calls.clone()
    }

    fn executed(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.lines.join("\n")).collect()
    }
}

struct ScriptRunner {
    outputs: HashMap<String, String>,
    fail_on: Option<String>,
    log: Rc<RefCell<Log>>,
}

impl Launcher for Script {
    fn preflight(&self) -> Result<(), ExecError> {
        if self.refuse_preflight {
            return Err(ExecError::Config("refused".to_string()));
        }
        Ok(())
    }

    fn launch(&self) -> Result<Box<dyn Runner>, ExecError> {
        self.log.borrow_mut().launches += 1;
        Ok(Box::new(ScriptRunner {
            outputs: self.outputs.clone(),
            fail_on: self.fail_on.clone(),
            log: Rc::clone(&self.log),
        }))
    }
}

impl Runner for ScriptRunner {
    fn run_lines(
        &mut self,
        lines: &[String],
        echo_input: bool,
        repl_mode: bool,
    ) -> Result<String, ExecError> {
        self.log.borrow_mut().calls.push(Call {
            lines: lines.to_vec(),
            echo: echo_input,
            repl: repl_mode,
        });
        let source = lines.join("\n");
        if self.fail_on.as_ref() == Some(&source) {
            return Err(ExecError::SessionTerminated {
                output: String::new(),
            });
        }
        let output = self.outputs.get(&source).cloned().unwrap_or_default();
        if echo_input {
            Ok(format!("{}\n{}", source, output))
        } else {
            Ok(output)
        }
    }

    fn close(self: Box<Self>) -> Result<(), ExecError> {
        self.log.borrow_mut().closes += 1;
        Ok(())
    }
}

fn shorthands() -> Vec<String> {
    vec!["pq".to_string(), "pmd".to_string()]
}

fn parse(source: &str) -> Document {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn run(source: &str, script: &Script) -> Document {
    execute_document_with(parse(source), script, &shorthands()).expect("execution failed")
}

fn text(s: &str) -> Inline {
    Inline::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Code blocks
// ---------------------------------------------------------------------------

#[test]
fn echo_block_keeps_transcript() {
    let script = Script::new(&[("1+1", "2")]);
    let doc = run("```{.python .echo}\n1+1\n```\n", &script);
    assert_eq!(
        doc.blocks,
        vec![Block::CodeBlock {
            attr: Attr::with_classes(["python", "echo"]),
            text: "1+1\n2".to_string(),
        }]
    );
    assert_eq!(
        script.calls(),
        vec![Call {
            lines: vec!["1+1".to_string()],
            echo: true,
            repl: false,
        }]
    );
    assert_eq!(doc.to_string(), "```{.python .echo}\n1+1\n2\n```\n");
}

#[test]
fn repl_tag_requests_prompts() {
    let script = Script::new(&[]);
    run("```{.python .echo .repl}\nx\n```\n", &script);
    assert!(script.calls()[0].repl);
}

#[test]
fn plain_block_is_removed() {
    let script = Script::new(&[]);
    let doc = run("```python\nx = 1\n```\n\nafter\n", &script);
    assert_eq!(doc.blocks, vec![Block::Paragraph(vec![text("after")])]);
    assert_eq!(script.executed(), vec!["x = 1"]);
    assert!(!script.calls()[0].echo);
}

#[test]
fn open_suite_gets_closing_line() {
    let script = Script::new(&[]);
    run("```python\nfor i in x:\n    f(i)\n```\n", &script);
    assert_eq!(
        script.calls()[0].lines,
        vec!["for i in x:", "    f(i)", ""]
    );
}

#[test]
fn untagged_block_is_not_executed() {
    let script = Script::new(&[]);
    let doc = run("```rust\nfn main() {}\n```\n", &script);
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(script.launches(), 0);
}

#[test]
fn noexec_suppresses_execution() {
    let script = Script::new(&[]);
    let source = "```{.python .noexec}\nx = 1\n```\n\n`pq(1)`{.noexec} `2`{.python .noexec}\n";
    let doc = run(source, &script);
    assert_eq!(doc, parse(source));
    assert_eq!(script.launches(), 0);
}

// ---------------------------------------------------------------------------
// Inline code
// ---------------------------------------------------------------------------

#[test]
fn inline_result_becomes_text() {
    let script = Script::new(&[("21*2", "42\n")]);
    let doc = run("Answer: `21*2`{.python}\n", &script);
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![text("Answer: "), text("42")])]
    );
    assert_eq!(doc.to_string(), "Answer: 42\n");
}

#[test]
fn as_code_keeps_code_node() {
    let script = Script::new(&[("21*2", "42")]);
    let doc = run("`21*2`{.python .asCode}\n", &script);
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![Inline::Code {
            attr: Attr::with_classes(["python", "asCode"]),
            text: "42".to_string(),
        }])]
    );
}

#[test]
fn shorthand_runs_without_tag_and_wraps_in_span() {
    let script = Script::new(&[("pq(10)", "10 m")]);
    let doc = run("`pq(10)`\n", &script);
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![Inline::Span {
            attr: Attr::default(),
            content: vec![text("10 m")],
        }])]
    );
}

#[test]
fn shorthand_must_cover_whole_span() {
    let script = Script::new(&[]);
    run("`x = pq(10)` and `pqx(1)`\n", &script);
    assert_eq!(script.launches(), 0);
}

#[test]
fn untagged_inline_code_is_left_alone() {
    let script = Script::new(&[]);
    let source = "Use `x + 1` here.\n";
    assert_eq!(run(source, &script), parse(source));
    assert_eq!(script.launches(), 0);
}

// ---------------------------------------------------------------------------
// Embedded code
// ---------------------------------------------------------------------------

#[test]
fn math_embedded_code_is_spliced() {
    let script = Script::new(&[("2+2", "4")]);
    let doc = Document::from_blocks(vec![Block::Paragraph(vec![Inline::Math {
        display: false,
        text: "x = `2+2`{.python} + y".to_string(),
    }])]);
    let doc = execute_document_with(doc, &script, &shorthands()).unwrap();
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![Inline::Math {
            display: false,
            text: "x = 4 + y".to_string(),
        }])]
    );
}

#[test]
fn parsed_math_embedded_code_is_spliced() {
    let script = Script::new(&[("2+2", "4")]);
    let doc = run("$x = `2+2`{.python} + y$\n", &script);
    assert_eq!(doc.to_string(), "$x = 4 + y$\n");
    assert_eq!(script.executed(), vec!["2+2"]);
}

#[test]
fn math_without_python_tag_is_untouched() {
    let script = Script::new(&[]);
    let original = Document::from_blocks(vec![Block::Paragraph(vec![Inline::Math {
        display: true,
        text: "`a`{.noexec .python}".to_string(),
    }])]);
    let doc = execute_document_with(original.clone(), &script, &shorthands()).unwrap();
    assert_eq!(doc, original);
    assert_eq!(script.launches(), 0);
}

fn image(dest: &str) -> Document {
    Document::from_blocks(vec![Block::Paragraph(vec![Inline::Image {
        dest: dest.to_string(),
        title: String::new(),
        alt: vec![text("plot")],
    }])])
}

#[test]
fn image_url_is_decoded_spliced_and_encoded() {
    let script = Script::new(&[("name()", "'fig 1'\n")]);
    let doc = execute_document_with(
        image("plots/%60name()%60%7B.python%7D.png"),
        &script,
        &shorthands(),
    )
    .unwrap();
    assert_eq!(doc, image("plots/fig%201.png"));
}

#[test]
fn image_url_keeps_escaped_percent() {
    let script = Script::new(&[("str(1+1)", "'2'\n")]);
    let doc = execute_document_with(
        image("100%25/%60str(1+1)%60%7B.python%7D.png"),
        &script,
        &shorthands(),
    )
    .unwrap();
    assert_eq!(doc, image("100%25/2.png"));
}

#[test]
fn image_url_without_code_is_untouched() {
    let script = Script::new(&[]);
    let doc = execute_document_with(image("plots/a%20b.png"), &script, &shorthands()).unwrap();
    assert_eq!(doc, image("plots/a%20b.png"));
    assert_eq!(script.launches(), 0);
}

// ---------------------------------------------------------------------------
// Deferred replacements
// ---------------------------------------------------------------------------

#[test]
fn markdown_result_replaces_paragraph() {
    let script = Script::new(&[("table", "# Title\n\nBody")]);
    let doc = run("Intro `table`{.python .md} end\n\nNext\n", &script);
    assert_eq!(
        doc.blocks,
        vec![
            Block::Heading {
                level: 1,
                attr: Attr::default(),
                content: vec![text("Title")],
            },
            Block::Paragraph(vec![text("Body")]),
            Block::Paragraph(vec![text("Next")]),
        ]
    );
}

#[test]
fn first_deferral_wins() {
    let script = Script::new(&[("a", "A"), ("b", "B")]);
    let doc = run("`a`{.python .md} `b`{.python .md}\n", &script);
    assert_eq!(doc.blocks, vec![Block::Paragraph(vec![text("A")])]);
    assert_eq!(script.executed(), vec!["a", "b"]);
}

#[test]
fn deferral_escalates_past_inline_containers() {
    let script = Script::new(&[("a", "A")]);
    let doc = run("**`a`{.python .md}**\n", &script);
    assert_eq!(doc.blocks, vec![Block::Paragraph(vec![text("A")])]);
}

#[test]
fn deferral_inside_list_item() {
    let script = Script::new(&[("a", "- x\n- y")]);
    let doc = run("- `a`{.python .md}\n", &script);
    assert_eq!(
        doc.blocks,
        vec![Block::BulletList {
            items: vec![Block::ListItem(vec![Block::BulletList {
                items: vec![
                    Block::ListItem(vec![Block::Plain(vec![text("x")])]),
                    Block::ListItem(vec![Block::Plain(vec![text("y")])]),
                ],
            }])],
        }]
    );
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[test]
fn front_matter_code_is_executed() {
    let script = Script::new(&[("x", "5")]);
    let doc = run("+++\ntitle = \"Value `x`{.python}\"\n+++\n\nBody\n", &script);
    assert_eq!(
        doc.meta.get("title"),
        Some(&MetaValue::Inlines(vec![text("Value "), text("5")]))
    );
}

#[test]
fn front_matter_markdown_becomes_blocks() {
    let script = Script::new(&[("a", "A")]);
    let doc = run("+++\ntitle = \"`a`{.python .md}\"\n+++\n\nBody\n", &script);
    assert_eq!(
        doc.meta.get("title"),
        Some(&MetaValue::Blocks(vec![Block::Paragraph(vec![text("A")])]))
    );
}

// ---------------------------------------------------------------------------
// Ordering and session lifetime
// ---------------------------------------------------------------------------

#[test]
fn execution_follows_reading_order() {
    let script = Script::new(&[]);
    let source = "\
1. `a`{.python} and **`b`{.python}**
2. `c`{.python}

> ```python
> d
> ```

| `e`{.python} |
|---|
| `f`{.python} |
";
    run(source, &script);
    assert_eq!(script.executed(), vec!["a", "b", "c", "d", "e", "f"]);
}

#[test]
fn session_is_lazy() {
    let script = Script::new(&[]);
    run("# Nothing to run\n\nJust text.\n", &script);
    assert_eq!(script.launches(), 0);
    assert_eq!(script.closes(), 0);
}

#[test]
fn session_is_shared_and_closed_once() {
    let script = Script::new(&[]);
    run("```python\na = 1\n```\n\n`a`{.python}\n\n```python\nb = a\n```\n", &script);
    assert_eq!(script.launches(), 1);
    assert_eq!(script.closes(), 1);
    assert_eq!(script.executed(), vec!["a = 1", "a", "b = a"]);
}

#[test]
fn session_is_closed_after_failure() {
    let script = Script {
        fail_on: Some("boom".to_string()),
        ..Script::new(&[])
    };
    let result = execute_document_with(
        parse("```python\nboom\n```\n\n`later`{.python}\n"),
        &script,
        &shorthands(),
    );
    assert!(matches!(result, Err(ExecError::SessionTerminated { .. })));
    assert_eq!(script.closes(), 1);
    assert_eq!(script.executed(), vec!["boom"]);
}

#[test]
fn failed_preflight_runs_nothing() {
    let script = Script {
        refuse_preflight: true,
        ..Script::new(&[])
    };
    let result = execute_document_with(parse("`1`{.python}\n"), &script, &shorthands());
    assert!(matches!(result, Err(ExecError::Config(_))));
    assert_eq!(script.launches(), 0);
}

#[test]
fn executor_starts_on_first_evaluation() {
    let script = Script::new(&[("1", "1")]);
    let mut executor = Executor::new(&script);
    assert!(!executor.is_started());
    assert_eq!(executor.evaluate("1").unwrap(), "1");
    assert!(executor.is_started());
    executor.close().unwrap();
    assert!(!executor.is_started());
    assert_eq!(script.launches(), 1);
    assert_eq!(script.closes(), 1);
}

#[test]
fn executor_refuses_work_after_close() {
    let script = Script::new(&[]);
    let mut executor = Executor::new(&script);
    assert!(!executor.is_started());
    executor.close().unwrap();
    assert!(!executor.is_started());
    assert!(matches!(
        executor.evaluate("1"),
        Err(ExecError::SessionClosed)
    ));
    assert_eq!(script.launches(), 0);
}
