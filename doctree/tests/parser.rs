use doctree::{Attr, Block, Document, Inline, MetaValue, Parser, parse_fragment};

fn parse(source: &str) -> Document {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn text(s: &str) -> Inline {
    Inline::Text(s.to_string())
}

// ---------------------------------------------------------------------------
// Code attributes
// ---------------------------------------------------------------------------

#[test]
fn fenced_info_string_forms() {
    let doc = parse("```python\na\n```\n\n```python {.echo}\nb\n```\n\n```{.python .echo #ex}\nc\n```\n");
    let attrs: Vec<Attr> = doc
        .blocks
        .into_iter()
        .map(|block| match block {
            Block::CodeBlock { attr, .. } => attr,
            other => panic!("expected code block, got {:?}", other),
        })
        .collect();
    assert_eq!(attrs[0], Attr::with_classes(["python"]));
    assert_eq!(attrs[1], Attr::with_classes(["python", "echo"]));
    assert_eq!(
        attrs[2],
        Attr {
            id: "ex".to_string(),
            ..Attr::with_classes(["python", "echo"])
        }
    );
}

#[test]
fn code_block_text() {
    let doc = parse("```python\nx = 1\n\ny = 2\n```\n");
    assert_eq!(
        doc.blocks,
        vec![Block::CodeBlock {
            attr: Attr::with_classes(["python"]),
            text: "x = 1\n\ny = 2\n".to_string(),
        }]
    );
}

#[test]
fn inline_code_attributes() {
    let doc = parse("Value `21*2`{.python .asCode} here.\n");
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![
            text("Value "),
            Inline::Code {
                attr: Attr::with_classes(["python", "asCode"]),
                text: "21*2".to_string(),
            },
            text(" here."),
        ])]
    );
}

#[test]
fn brace_group_after_space_is_text() {
    let doc = parse("`x` {.python}\n");
    assert_eq!(
        doc.blocks,
        vec![Block::Paragraph(vec![
            Inline::Code {
                attr: Attr::default(),
                text: "x".to_string(),
            },
            text(" {.python}"),
        ])]
    );
}

#[test]
fn key_value_attributes() {
    assert_eq!(
        Attr::parse("{.python key=v other=\"a b\"}"),
        Some(Attr {
            id: String::new(),
            classes: vec!["python".to_string()],
            pairs: vec![
                ("key".to_string(), "v".to_string()),
                ("other".to_string(), "a b".to_string()),
            ],
        })
    );
    assert_eq!(Attr::parse("{.python"), None);
    assert_eq!(Attr::parse("{. }"), None);
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

#[test]
fn front_matter_values() {
    let doc = parse(
        "+++\ntitle = \"A *bold* claim\"\ndraft = true\nyear = 2024\nauthors = [\"X\"]\nextra = { note = \"n\" }\n+++\n\nBody\n",
    );
    assert_eq!(
        doc.meta.get("title"),
        Some(&MetaValue::Inlines(vec![
            text("A "),
            Inline::Emphasis(vec![text("bold")]),
            text(" claim"),
        ]))
    );
    assert_eq!(doc.meta.get("draft"), Some(&MetaValue::Bool(true)));
    assert_eq!(doc.meta.get("year"), Some(&MetaValue::Str("2024".to_string())));
    assert_eq!(
        doc.meta.get("authors"),
        Some(&MetaValue::List(vec![MetaValue::Inlines(vec![text("X")])]))
    );
    assert!(matches!(doc.meta.get("extra"), Some(MetaValue::Map(_))));
    assert_eq!(doc.blocks, vec![Block::Paragraph(vec![text("Body")])]);
}

#[test]
fn multi_paragraph_string_is_blocks() {
    let doc = parse("+++\nabstract = \"One.\\n\\nTwo.\"\n+++\n");
    assert_eq!(
        doc.meta.get("abstract"),
        Some(&MetaValue::Blocks(vec![
            Block::Paragraph(vec![text("One.")]),
            Block::Paragraph(vec![text("Two.")]),
        ]))
    );
}

#[test]
fn front_matter_error_has_span() {
    let source = "+++\ntitle = \"ok\"\nbroken = \n+++\n";
    let errors = Parser::new(source.to_string(), 3).parse().unwrap_err();
    assert_eq!(errors.len(), 1);
    let error = &errors[0];
    assert_eq!(error.message, "invalid front matter");
    assert_eq!(error.file_id, 3);
    assert!(error.span.start >= source.find("broken").unwrap());
    assert!(error.span.end <= source.len());
    assert!(!error.notes.is_empty());
}

#[test]
fn front_matter_only_at_start() {
    let doc = parse("Intro\n\n+++\nx = 1\n+++\n");
    assert!(doc.meta.is_empty());
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

#[test]
fn tight_list_items_are_plain() {
    let doc = parse("- a\n- b\n");
    assert_eq!(
        doc.blocks,
        vec![Block::BulletList {
            items: vec![
                Block::ListItem(vec![Block::Plain(vec![text("a")])]),
                Block::ListItem(vec![Block::Plain(vec![text("b")])]),
            ],
        }]
    );
}

#[test]
fn math_spans() {
    let doc = parse("Inline $x^2$ and\n\n$$y$$\n");
    assert_eq!(
        doc.blocks[0],
        Block::Paragraph(vec![
            text("Inline "),
            Inline::Math {
                display: false,
                text: "x^2".to_string(),
            },
            text(" and"),
        ])
    );
    assert!(matches!(
        &doc.blocks[1],
        Block::Paragraph(content) if matches!(content.as_slice(), [Inline::Math { display: true, .. }])
    ));
}

#[test]
fn table_head_and_rows() {
    let doc = parse("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
    let Block::Table {
        alignments,
        head,
        rows,
    } = &doc.blocks[0]
    else {
        panic!("expected table");
    };
    assert_eq!(alignments.len(), 2);
    assert_eq!(
        **head,
        Block::TableRow(vec![
            Block::TableCell(vec![text("a")]),
            Block::TableCell(vec![text("b")]),
        ])
    );
    assert_eq!(rows.len(), 1);
}

#[test]
fn fragment_ignores_front_matter_syntax() {
    let blocks = parse_fragment("+++\nx = 1\n+++\n");
    assert!(!blocks.is_empty());
    assert!(!matches!(blocks[0], Block::CodeBlock { .. }));
}
