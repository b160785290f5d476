//! Template strings with embedded `{expression}` segments.
//!
//! Literal text is copied as-is, `{{` and `}}` produce literal braces, and
//! everything between a lone `{` and its matching `}` is an expression.
//! Braces inside string literals and nested map literals (`#{a: 1}`) do not
//! terminate the expression.

use crate::core::error::{EvalError, EvalResult};

/// Part of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Text copied to the output verbatim
    Literal(String),
    /// Expression source and its byte offset in the template
    Expr { source: String, offset: usize },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string.
    pub fn parse(src: &str) -> EvalResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = src.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(EvalError::Template {
                        offset,
                        reason: "single '}' is not allowed".to_string(),
                    })
                }
                '{' => {
                    let end = find_closing(src, offset + 1)?;
                    let source = src[offset + 1..end].trim();
                    if source.is_empty() {
                        return Err(EvalError::Template {
                            offset,
                            reason: "empty expression".to_string(),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Expr {
                        source: source.to_string(),
                        offset: offset + 1,
                    });
                    while chars.peek().is_some_and(|(i, _)| *i <= end) {
                        chars.next();
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the template contains no expressions.
    pub fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }
}

/// Byte offset of the `}` closing the expression starting at `start`.
fn find_closing(src: &str, start: usize) -> EvalResult<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in src[start..].char_indices() {
        let pos = start + i;
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            '{' => depth += 1,
            '}' if depth == 0 => return Ok(pos),
            '}' => depth -= 1,
            _ => {}
        }
    }

    Err(EvalError::Template {
        offset: start.saturating_sub(1),
        reason: if quote.is_some() {
            "unterminated string in expression".to_string()
        } else {
            "expected '}' before end of template".to_string()
        },
    })
}
