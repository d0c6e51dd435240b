//! Source instrumentation
//!
//! Rewrites a script so that the value of every bare top-level expression is
//! handed to the capture hook. Everything else in the source is copied through
//! byte for byte, which keeps the line of every statement where the user wrote
//! it.
//!
//! ```text
//! let x = 5;          let x = 5;
//! x + 1;        =>    __captureResult(x + 1);
//! if (x) { x; }       if (x) { x; }
//! ```

use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

/// Name of the global the sandbox installs to receive expression values
pub const CAPTURE_HOOK: &str = "__captureResult";

/// The source could not be parsed as a standalone classic script.
///
/// `line` and `column` are 1-based and point at the parser's primary label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub message: String,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

impl ParseFailure {
    fn at(source: &str, message: impl Into<String>, offset: usize) -> Self {
        let (line, column) = line_column(source, offset);
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

impl std::error::Error for ParseFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Bare expression whose value is captured
    Expression { expr: Span, sequence: bool },
    /// `var`/`let`/`const` or function declaration
    Declaration,
    Other,
}

#[derive(Debug, Clone, Copy)]
struct TopLevel {
    span: Span,
    shape: Shape,
}

/// Text inserted into one line of the instrumented source, in instrumented
/// coordinates (1-based column, length in characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Insertion {
    line: u32,
    column: u32,
    len: u32,
}

/// Maps columns of the instrumented source back to the source as written.
///
/// Instrumentation never adds lines, so only columns need translating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    insertions: Vec<Insertion>,
}

impl ColumnMap {
    /// Column in the source as written for a 1-based `column` on `line` of the
    /// instrumented source. Positions inside inserted text map to where the
    /// text was inserted.
    pub fn source_column(&self, line: u32, column: u32) -> u32 {
        let mut shift = 0;
        for insertion in self.insertions.iter().filter(|i| i.line == line) {
            if column >= insertion.column + insertion.len {
                shift += insertion.len;
            } else if column >= insertion.column {
                return insertion.column - shift;
            } else {
                break;
            }
        }
        column - shift
    }
}

/// Instrumented source plus the column mapping back to the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumented {
    pub code: String,
    pub columns: ColumnMap,
}

/// Parse `source` and wrap each top-level expression statement in a call to
/// [`CAPTURE_HOOK`].
pub fn instrument(source: &str) -> Result<String, ParseFailure> {
    instrument_mapped(source).map(|instrumented| instrumented.code)
}

/// Like [`instrument`], also returning where text was inserted
pub fn instrument_mapped(source: &str) -> Result<Instrumented, ParseFailure> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_script(true);
    let parsed = Parser::new(&allocator, source, source_type).parse();

    if let Some(diagnostic) = parsed.errors.first() {
        let offset = diagnostic
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset())
            .unwrap_or(source.len());
        return Err(ParseFailure::at(
            source,
            diagnostic.message.to_string(),
            offset,
        ));
    }
    if parsed.panicked {
        return Err(ParseFailure::at(source, "Unexpected token", source.len()));
    }

    // A leading string statement is parsed as a directive, not as a statement
    // of the body, but it is still a bare expression as far as output goes.
    let mut items: Vec<TopLevel> = parsed
        .program
        .directives
        .iter()
        .map(|directive| TopLevel {
            span: directive.span,
            shape: Shape::Expression {
                expr: directive.expression.span,
                sequence: false,
            },
        })
        .collect();
    items.extend(parsed.program.body.iter().map(classify));

    // Emission walks forward through the source, so order must be by offset.
    items.sort_by_key(|item| item.span.start);

    let (code, inserted_at) = rewrite(source, &items);
    let columns = ColumnMap {
        insertions: inserted_at
            .into_iter()
            .map(|(offset, len)| {
                let (line, column) = line_column(&code, offset);
                Insertion {
                    line,
                    column,
                    len: len as u32,
                }
            })
            .collect(),
    };
    tracing::trace!(
        statements = items.len(),
        captured = items
            .iter()
            .filter(|item| matches!(item.shape, Shape::Expression { .. }))
            .count(),
        "instrumented source"
    );
    Ok(Instrumented { code, columns })
}

fn classify(statement: &Statement<'_>) -> TopLevel {
    let shape = match statement {
        Statement::ExpressionStatement(stmt) => Shape::Expression {
            expr: stmt.expression.span(),
            sequence: matches!(stmt.expression, Expression::SequenceExpression(_)),
        },
        Statement::VariableDeclaration(_) | Statement::FunctionDeclaration(_) => {
            Shape::Declaration
        }
        _ => Shape::Other,
    };
    TopLevel {
        span: statement.span(),
        shape,
    }
}

/// Returns the rewritten source and every insertion as (byte offset in the
/// output, length).
fn rewrite(source: &str, items: &[TopLevel]) -> (String, Vec<(usize, usize)>) {
    let mut out = String::with_capacity(source.len() + items.len() * (CAPTURE_HOOK.len() + 3));
    let mut inserted = Vec::new();
    let mut cursor = 0usize;

    let mut insert = |out: &mut String, text: &str| {
        if !text.is_empty() {
            inserted.push((out.len(), text.len()));
            out.push_str(text);
        }
    };

    for item in items {
        let start = item.span.start as usize;
        let end = item.span.end as usize;
        if start < cursor {
            continue;
        }

        match item.shape {
            Shape::Expression { expr, sequence } => {
                let expr_start = expr.start as usize;
                let expr_end = expr.end as usize;
                let (open, close) = if sequence { ("((", "))") } else { ("(", ")") };

                out.push_str(&source[cursor..expr_start]);
                insert(&mut out, &format!("{}{}", CAPTURE_HOOK, open));
                out.push_str(&source[expr_start..expr_end]);
                insert(&mut out, close);

                // Whatever follows the expression (comments, the semicolon)
                // stays as written. Statements ended by ASI get an explicit one.
                let tail = &source[expr_end..end];
                out.push_str(tail);
                if !tail.ends_with(';') {
                    insert(&mut out, ";");
                }
            }
            Shape::Declaration | Shape::Other => out.push_str(&source[cursor..end]),
        }
        cursor = end;
    }

    out.push_str(&source[cursor..]);
    (out, inserted)
}

/// Convert a byte offset into a 1-based line and 1-based column.
///
/// Lines break on `\n`, `\r\n`, `\r`, U+2028 and U+2029, matching ECMAScript
/// line terminators. Columns count UTF-16 code units, the unit V8 uses for
/// stack frame columns.
pub fn line_column(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let mut line = 1u32;
    let mut column = 1u32;
    let mut chars = source.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        if index >= offset {
            break;
        }
        match ch {
            '\r' => {
                if let Some((next, '\n')) = chars.peek().copied() {
                    if next < offset {
                        chars.next();
                    }
                }
                line += 1;
                column = 1;
            }
            '\n' | '\u{2028}' | '\u{2029}' => {
                line += 1;
                column = 1;
            }
            _ => column += ch.len_utf16() as u32,
        }
    }

    (line, column)
}
