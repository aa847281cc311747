//! ABOUTME: Splits a template string into literal text and `${{ ... }}` spans
//! ABOUTME: Brace- and quote-aware so map/list literals inside an expr don't confuse the scan

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Part<'a> {
    Text(&'a str),
    Expr(&'a str),
}

/// Split `s` into literal text and expression spans. If `s` is exactly one
/// `${{ expr }}` with no surrounding text, the single returned part is
/// `Part::Expr` and the caller should treat the result as a "pure
/// expression".
pub fn split(s: &str) -> Result<Vec<Part<'_>>, ExprError> {
    let mut parts = Vec::new();
    let bytes = s.as_bytes();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        match s[cursor..].find("${{") {
            None => {
                parts.push(Part::Text(&s[cursor..]));
                break;
            }
            Some(rel_start) => {
                let marker_start = cursor + rel_start;
                if marker_start > cursor {
                    parts.push(Part::Text(&s[cursor..marker_start]));
                }
                let expr_start = marker_start + 3;
                let expr_end = find_template_close(s, expr_start)?;
                parts.push(Part::Expr(s[expr_start..expr_end].trim()));
                cursor = expr_end + 2;
            }
        }
    }

    if parts.is_empty() {
        parts.push(Part::Text(""));
    }

    Ok(parts)
}

/// `true` if `s` is exactly one `${{ ... }}` span with nothing else around it.
#[must_use]
pub fn is_pure_expression(parts: &[Part<'_>]) -> bool {
    matches!(parts, [Part::Expr(_)])
}

/// Scan forward from `start` (just past the opening `${{`) for the matching
/// `}}`, tracking brace depth for nested map/list literals and ignoring
/// braces inside quoted strings.
fn find_template_close(s: &str, start: usize) -> Result<usize, ExprError> {
    let mut depth: u32 = 0;
    let mut in_string: Option<char> = None;
    let mut chars = s[start..].char_indices().peekable();

    while let Some((rel, ch)) = chars.next() {
        let abs = start + rel;
        if let Some(quote) = in_string {
            if ch == '\\' {
                chars.next();
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => in_string = Some(ch),
            '{' => depth += 1,
            '}' => {
                if depth > 0 {
                    depth -= 1;
                } else if matches!(chars.peek(), Some((_, '}'))) {
                    return Ok(abs);
                } else {
                    return Err(ExprError::UnterminatedTemplate);
                }
            }
            _ => {}
        }
    }
    Err(ExprError::UnterminatedTemplate)
}
