//! Structured diagnostics returned to the caller.
//!
//! Every diagnosable rule violation becomes one immutable `Diagnostic`;
//! analysis keeps walking so a single pass reports everything it can find.
//! The JSON shape matches what the downstream driver already consumes.

use serde::{Deserialize, Serialize};

use crate::ast::Pos;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub label: String,
}

impl Span {
    pub fn new(pos: Pos, length: usize, label: impl Into<String>) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
            length: length.max(1),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub message: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub primary_span: Span,
    #[serde(default)]
    pub secondary_spans: Vec<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Diagnostic {
    pub fn new(code: &str, message: impl Into<String>, primary_span: Span) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            primary_span,
            secondary_spans: Vec::new(),
            suggestion: None,
            note: None,
        }
    }

    pub fn with_secondary(mut self, span: Span) -> Self {
        self.secondary_spans.push(span);
        self
    }

    pub fn with_suggestion(mut self, message: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.suggestion = Some(Suggestion {
            message: message.into(),
            replacement: replacement.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    // Factory constructors, one per diagnosable condition. The codes follow
    // the diagnostic database the rest of the toolchain uses.

    pub fn name_not_found(name: &str, pos: Pos) -> Self {
        Self::new(
            "E0425",
            format!("cannot find `{}` in this scope", name),
            Span::new(pos, name.len(), "not found in this scope"),
        )
    }

    pub fn duplicate_declaration(name: &str, pos: Pos, first: Pos) -> Self {
        Self::new(
            "E0128",
            format!("`{}` is already declared in this scope", name),
            Span::new(pos, name.len(), "re-declared here"),
        )
        .with_secondary(Span::new(first, name.len(), "first declared here"))
    }

    pub fn type_mismatch(expected: &str, found: &str, pos: Pos, len: usize) -> Self {
        Self::new(
            "E0308",
            "mismatched types",
            Span::new(pos, len, format!("expected `{}`, found `{}`", expected, found)),
        )
    }

    pub fn arity_mismatch(name: &str, expected: usize, found: usize, pos: Pos) -> Self {
        Self::new(
            "E0061",
            format!(
                "function `{}` takes {} argument{} but {} {} supplied",
                name,
                expected,
                if expected == 1 { "" } else { "s" },
                found,
                if found == 1 { "was" } else { "were" },
            ),
            Span::new(pos, name.len(), format!("expected {} arguments", expected)),
        )
    }

    pub fn unknown_field(struct_name: &str, field: &str, pos: Pos) -> Self {
        Self::new(
            "E0609",
            format!("no field `{}` on struct `{}`", field, struct_name),
            Span::new(pos, field.len(), "unknown field"),
        )
    }

    pub fn use_after_move(name: &str, pos: Pos, moved_at: Pos) -> Self {
        Self::new(
            "E0382",
            format!("use of moved value: `{}`", name),
            Span::new(pos, name.len(), "value used here after move"),
        )
        .with_secondary(Span::new(moved_at, name.len(), "value moved here"))
    }

    pub fn move_of_moved(name: &str, pos: Pos, moved_at: Pos) -> Self {
        Self::new(
            "E0382",
            format!("use of moved value: `{}`", name),
            Span::new(pos, name.len(), "value moved here after earlier move"),
        )
        .with_secondary(Span::new(moved_at, name.len(), "value first moved here"))
    }

    pub fn second_exclusive_borrow(name: &str, pos: Pos, first: Pos) -> Self {
        Self::new(
            "E0499",
            format!("cannot borrow `{}` exclusively more than once at a time", name),
            Span::new(pos, name.len(), "second exclusive borrow occurs here"),
        )
        .with_secondary(Span::new(first, name.len(), "first exclusive borrow occurs here"))
    }

    pub fn borrow_conflict(name: &str, how: &str, pos: Pos, conflict: Pos, conflict_label: &str) -> Self {
        Self::new(
            "E0502",
            format!("cannot take a {} view of `{}`", how, name),
            Span::new(pos, name.len(), format!("{} view taken here", how)),
        )
        .with_secondary(Span::new(conflict, name.len(), conflict_label))
    }

    pub fn assign_to_const(name: &str, pos: Pos, declared_at: Pos) -> Self {
        Self::new(
            "E0384",
            format!("cannot assign to constant binding `{}`", name),
            Span::new(pos, name.len(), "assignment to constant"),
        )
        .with_secondary(Span::new(declared_at, name.len(), "declared constant here"))
        .with_suggestion("declare the binding as mutable", format!("var {}", name))
    }

    pub fn ref_outlives_referent(name: &str, pos: Pos, referent_declared: Pos) -> Self {
        Self::new(
            "E0597",
            format!("`{}` does not live long enough", name),
            Span::new(pos, name.len(), "referent does not outlive the reference"),
        )
        .with_secondary(Span::new(referent_declared, name.len(), "referent declared here"))
    }

    /// Plain-text rendering with a source-line caret, for callers that hold
    /// the original source.
    pub fn render(&self, source: &str) -> String {
        let mut out = format!("error[{}]: {}\n", self.code, self.message);
        render_span(&mut out, source, &self.primary_span, '^');
        for span in &self.secondary_spans {
            render_span(&mut out, source, span, '-');
        }
        if let Some(note) = &self.note {
            out.push_str(&format!("  note: {}\n", note));
        }
        if let Some(s) = &self.suggestion {
            out.push_str(&format!("  help: {}: `{}`\n", s.message, s.replacement));
        }
        out
    }
}

fn render_span(out: &mut String, source: &str, span: &Span, marker: char) {
    let lines: Vec<&str> = source.lines().collect();
    if span.line == 0 || span.line > lines.len() {
        out.push_str(&format!("  --> {}:{}: {}\n", span.line, span.column, span.label));
        return;
    }
    let content = lines[span.line - 1];
    let pad = " ".repeat(span.column.saturating_sub(1));
    let underline: String = std::iter::repeat(marker).take(span.length).collect();
    out.push_str(&format!(
        "  --> {}:{}\n   | {}\n   | {}{} {}\n",
        span.line, span.column, content, pad, underline, span.label
    ));
}

/// Append-only diagnostic collection owned by the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.code.as_str()).collect()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
