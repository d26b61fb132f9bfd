//! Blank-line repair for indented suites.
//!
//! An interactive interpreter ends an indented suite at the first blank
//! line, so a blank line inside a loop body has to be sent with the
//! indentation of the line that follows it.

/// Columns per indentation level.
pub const INDENT_WIDTH: usize = 4;

/// Indentation level of a line: leading whitespace divided by
/// [`INDENT_WIDTH`], rounded down.
pub fn indent_level(line: &str) -> usize {
    let leading = line.chars().take_while(|c| c.is_whitespace()).count();
    leading / INDENT_WIDTH
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Replace blank lines inside an indented suite with the indentation of the
/// next non-blank line (or nothing, if no such line follows).
pub fn normalize_indentation<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut current = 0;

    for (idx, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if !is_blank(line) {
            current = indent_level(line);
            out.push(line.to_string());
            continue;
        }
        if current == 0 {
            out.push(line.to_string());
            continue;
        }
        let next = lines[idx + 1..]
            .iter()
            .map(AsRef::as_ref)
            .find(|l| !is_blank(l))
            .map(indent_level)
            .unwrap_or(0);
        out.push(" ".repeat(next * INDENT_WIDTH));
    }

    out
}
