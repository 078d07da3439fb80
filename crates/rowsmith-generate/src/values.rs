use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::{Rng, RngCore};
use rand_chacha::ChaCha8Rng;

use rowsmith_core::{FieldKind, FieldSpec, Literal, PatternSegment, parse_pattern};

use crate::errors::GenerationError;
use crate::registry::{Row, TableRegistry};

/// Probability that a nullable field's generation step is skipped.
const NULL_PROBABILITY: f64 = 0.1;

const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

/// One generated cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Render for CSV output; null becomes the empty string.
    pub fn to_csv(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(value) => value.to_string(),
            Value::Text(value) => value.clone(),
            Value::Date(value) => value.format("%Y-%m-%d").to_string(),
            Value::Timestamp(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    /// Stable string key for uniqueness sets and group keys.
    pub fn key(&self) -> String {
        match self {
            Value::Null => "<null>".to_string(),
            other => other.to_csv(),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Int(value) => Value::Int(*value),
            Literal::Text(value) => Value::Text(value.clone()),
        }
    }
}

/// Per-table counters backing `code` sequences and `auto_increment`.
#[derive(Debug, Default)]
pub struct TableCounters {
    seq: HashMap<String, u64>,
    auto: HashMap<String, i64>,
}

impl TableCounters {
    pub fn next_seq(&mut self, field: &str) -> u64 {
        let counter = self.seq.entry(field.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn next_auto(&mut self, field: &str) -> i64 {
        let counter = self.auto.entry(field.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Restart detail-line numbering; called once per parent row so child
    /// tables count lines within their parent group.
    pub fn reset_auto(&mut self) {
        self.auto.clear();
    }
}

/// Context for generating one field of one row.
pub struct FieldContext<'a> {
    /// Owning table name, used in diagnostics.
    pub table: &'a str,
    /// Position of the row within its table.
    pub row_index: u64,
    /// Fields of the current row generated so far.
    pub row: &'a Row,
    /// Owning parent row, for child tables.
    pub parent: Option<&'a Row>,
    /// Name of the parent table, when `parent` is set.
    pub parent_table: Option<&'a str>,
    /// Version number assigned by the version expander.
    pub version: Option<i64>,
    /// Finalized upstream tables.
    pub registry: &'a TableRegistry,
    /// Run start instant; dates and timestamps fall strictly before it.
    pub now: NaiveDateTime,
    pub counters: &'a mut TableCounters,
}

/// Produce one value for a field, honoring `nullable` and `default`.
pub fn generate_field(
    name: &str,
    spec: &FieldSpec,
    ctx: &mut FieldContext<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<Value, GenerationError> {
    let value = match generate_kind(name, &spec.kind, ctx, rng) {
        Ok(value) => value,
        // An empty reference target only fails the run when no fallback
        // value is declared.
        Err(err @ GenerationError::EmptyReferenceTarget { .. }) => match &spec.default {
            Some(default) => Value::from(default),
            None => return Err(err),
        },
        Err(err) => return Err(err),
    };

    if spec.nullable && rng.random_bool(NULL_PROBABILITY) {
        return Ok(spec
            .default
            .as_ref()
            .map(Value::from)
            .unwrap_or(Value::Null));
    }

    Ok(value)
}

fn generate_kind(
    name: &str,
    kind: &FieldKind,
    ctx: &mut FieldContext<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<Value, GenerationError> {
    match kind {
        FieldKind::Uuid => Ok(Value::Text(random_uuid(rng))),
        FieldKind::Const { value } => Ok(Value::from(value)),
        FieldKind::Int { min, max } => {
            if min > max {
                return Err(GenerationError::InvalidRange {
                    table: ctx.table.to_string(),
                    field: name.to_string(),
                    min: *min,
                    max: *max,
                });
            }
            Ok(Value::Int(rng.random_range(*min..=*max)))
        }
        FieldKind::Date => {
            let offset = rng.random_range(1..=365);
            Ok(Value::Date(ctx.now.date() - Duration::days(offset)))
        }
        FieldKind::Timestamp => {
            let offset = rng.random_range(1..=SECONDS_PER_YEAR);
            Ok(Value::Timestamp(ctx.now - Duration::seconds(offset)))
        }
        FieldKind::Ref { table, field } => generate_ref(name, table, field, ctx, rng),
        FieldKind::Code { pattern } => expand_code(name, pattern, ctx, rng),
        FieldKind::VersionSequence => Ok(version_value(name, ctx)),
        FieldKind::AutoIncrement => Ok(Value::Int(ctx.counters.next_auto(name))),
    }
}

fn generate_ref(
    name: &str,
    target: &str,
    target_field: &str,
    ctx: &mut FieldContext<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<Value, GenerationError> {
    // Child rows link to their own parent row, not a random one.
    if let (Some(parent), Some(parent_table)) = (ctx.parent, ctx.parent_table)
        && parent_table == target
        && let Some(value) = parent.get(target_field)
    {
        return Ok(value.clone());
    }

    let rows = ctx
        .registry
        .rows(target)
        .ok_or_else(|| GenerationError::ReferenceOrdering {
            table: ctx.table.to_string(),
            target: target.to_string(),
        })?;
    if rows.is_empty() {
        return Err(GenerationError::EmptyReferenceTarget {
            table: ctx.table.to_string(),
            field: name.to_string(),
            target: target.to_string(),
        });
    }

    let row = &rows[rng.random_range(0..rows.len())];
    Ok(row.get(target_field).cloned().unwrap_or(Value::Null))
}

fn version_value(name: &str, ctx: &FieldContext<'_>) -> Value {
    if let Some(version) = ctx.version {
        return Value::Int(version);
    }
    if let Some(parent) = ctx.parent
        && let Some(value) = parent.get(name).or_else(|| parent.get("version"))
    {
        return value.clone();
    }
    Value::Int(1)
}

fn expand_code(
    name: &str,
    pattern: &str,
    ctx: &mut FieldContext<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<Value, GenerationError> {
    let segments = parse_pattern(pattern).map_err(|reason| {
        rowsmith_core::Error::InvalidSchema(format!("code field {}.{name}: {reason}", ctx.table))
    })?;

    let mut out = String::new();
    for segment in &segments {
        match segment {
            PatternSegment::Literal(text) => out.push_str(text),
            PatternSegment::Seq { width } => {
                let next = ctx.counters.next_seq(name);
                out.push_str(&format!("{:0fill$}", next, fill = *width));
            }
            PatternSegment::Date { format } => {
                out.push_str(&ctx.now.date().format(format).to_string());
            }
            PatternSegment::Alpha => {
                out.push(char::from(b'A' + rng.random_range(0..26u8)));
            }
        }
    }
    Ok(Value::Text(out))
}

/// RFC-4122-shaped identifier drawn from the seeded stream, so runs are
/// reproducible for a fixed seed.
fn random_uuid(rng: &mut ChaCha8Rng) -> String {
    let mut bytes = [0_u8; 16];
    rng.fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    uuid::Uuid::from_bytes(bytes).to_string()
}
