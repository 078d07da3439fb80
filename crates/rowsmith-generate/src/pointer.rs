use std::collections::HashMap;

use rowsmith_core::TableSchema;

use crate::errors::GenerationError;
use crate::registry::{Row, TableRegistry};
use crate::values::Value;

/// Materialize a pointer table from its finalized source.
///
/// Source rows are grouped by the pointer's key fields; within each group
/// the row with the numerically greatest `latest_field` survives, ties
/// going to the first-encountered row. Groups emit in first-encounter
/// order, so the output is deterministic for a fixed source ordering and
/// re-running against the same source yields identical rows. An empty
/// source is a valid empty result, not an error.
pub fn materialize_pointer(
    schema: &TableSchema,
    registry: &TableRegistry,
) -> Result<Vec<Row>, GenerationError> {
    let source = schema.source_table.as_deref().unwrap_or_default();
    let latest_field = schema.latest_field.as_deref().unwrap_or_default();

    let rows = registry
        .rows(source)
        .ok_or_else(|| GenerationError::ReferenceOrdering {
            table: schema.name.clone(),
            target: source.to_string(),
        })?;

    let mut group_index: HashMap<Vec<String>, usize> = HashMap::new();
    // (winning source row, its latest rank), in first-encounter order
    let mut groups: Vec<(&Row, f64)> = Vec::new();

    for row in rows {
        let key: Vec<String> = schema
            .key
            .iter()
            .map(|field| row.get(field).map(Value::key).unwrap_or_default())
            .collect();
        let rank = latest_rank(row.get(latest_field));

        match group_index.get(&key) {
            Some(&index) => {
                if rank > groups[index].1 {
                    groups[index] = (row, rank);
                }
            }
            None => {
                group_index.insert(key, groups.len());
                groups.push((row, rank));
            }
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (winner, _) in groups {
        let mut row = Row::new();
        for field in &schema.key {
            row.insert(
                field.clone(),
                winner.get(field).cloned().unwrap_or(Value::Null),
            );
        }
        row.insert(
            latest_field.to_string(),
            winner.get(latest_field).cloned().unwrap_or(Value::Null),
        );
        out.push(row);
    }

    Ok(out)
}

/// Ordering rank of a `latest_field` value. Non-numeric values never win
/// over numeric ones; missing values rank lowest.
fn latest_rank(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Int(value)) => *value as f64,
        Some(Value::Text(text)) => text.parse::<f64>().unwrap_or(f64::NEG_INFINITY),
        Some(Value::Date(date)) => {
            date.signed_duration_since(chrono::NaiveDate::default()).num_days() as f64
        }
        Some(Value::Timestamp(stamp)) => {
            stamp
                .signed_duration_since(chrono::NaiveDateTime::default())
                .num_seconds() as f64
        }
        Some(Value::Null) | None => f64::NEG_INFINITY,
    }
}
