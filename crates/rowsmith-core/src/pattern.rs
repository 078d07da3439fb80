//! Parser for `code` field patterns.
//!
//! A pattern is literal text with `{...}` placeholders: `{seq:N}` for a
//! zero-padded per-field sequence number, `{date:FORMAT}` for the run date
//! rendered with a strftime format, and `{alpha}` for one random uppercase
//! letter. Expansion lives in the generation engine; this module only
//! produces the typed segment list so schema validation and generation
//! agree on the grammar.

use chrono::format::{Item, StrftimeItems};

/// One parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    /// Literal text copied through unchanged.
    Literal(String),
    /// Per-field sequence counter, zero-padded to `width` digits.
    Seq { width: usize },
    /// Run date rendered with a chrono strftime format.
    Date { format: String },
    /// One uniformly random uppercase ASCII letter.
    Alpha,
}

/// Parse a pattern into segments, rejecting unknown placeholders.
pub fn parse_pattern(pattern: &str) -> Result<Vec<PatternSegment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            literal.push(ch);
            continue;
        }

        let mut token = String::new();
        let mut closed = false;
        for ch in chars.by_ref() {
            if ch == '}' {
                closed = true;
                break;
            }
            token.push(ch);
        }
        if !closed {
            return Err(format!("unterminated placeholder in pattern '{pattern}'"));
        }

        if !literal.is_empty() {
            segments.push(PatternSegment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(parse_token(&token)?);
    }

    if !literal.is_empty() {
        segments.push(PatternSegment::Literal(literal));
    }

    Ok(segments)
}

fn parse_token(token: &str) -> Result<PatternSegment, String> {
    if token == "alpha" {
        return Ok(PatternSegment::Alpha);
    }
    if let Some(width) = token.strip_prefix("seq:") {
        let width = width
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid sequence width '{width}'"))?;
        if width == 0 {
            return Err("sequence width must be at least 1".to_string());
        }
        return Ok(PatternSegment::Seq { width });
    }
    if let Some(format) = token.strip_prefix("date:") {
        if format.is_empty() {
            return Err("empty date format".to_string());
        }
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid date format '{format}'"));
        }
        return Ok(PatternSegment::Date {
            format: format.to_string(),
        });
    }
    Err(format!("unknown placeholder '{{{token}}}'"))
}
