use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDateTime;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use rowsmith_core::{
    FieldKind, FieldSpec, Fields, Record, Span, TableCategory, TableSchema, generation_order,
    validate_tables,
};

use crate::errors::GenerationError;
use crate::model::{GenerateOptions, GenerationReport, TableReport};
use crate::output::csv::write_table_csv;
use crate::pointer::materialize_pointer;
use crate::registry::{FinalizedTable, Row, TableRegistry};
use crate::unique::UniquenessEnforcer;
use crate::values::{FieldContext, TableCounters, Value, generate_field};

/// Result of a generation run.
#[derive(Debug)]
pub struct GenerationResult {
    pub run_dir: PathBuf,
    pub report: GenerationReport,
    pub dataset: TableRegistry,
}

/// Entry point for generating datasets from a set of table schemas.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    /// Generate every table and write one CSV per table plus a run report
    /// under a fresh run directory.
    pub fn run(&self, tables: &[TableSchema]) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
        let run_dir = self
            .options
            .out_dir
            .join(format!("{timestamp}__run_{run_id}"));
        std::fs::create_dir_all(&run_dir)?;

        let now = chrono::Local::now().naive_local();
        let mut report = GenerationReport::new(run_id.clone(), self.options.seed);

        info!(
            run_id = %run_id,
            tables = tables.len(),
            seed = self.options.seed,
            "generation started"
        );

        let outcome = generate_all(tables, &self.options, now, &mut report);
        report.duration_ms = start.elapsed().as_millis() as u64;

        let report_path = run_dir.join("generation_report.json");
        match outcome {
            Ok(registry) => {
                let mut bytes_written = 0_u64;
                for table in registry.tables() {
                    let csv_path = run_dir.join(format!("{}.csv", table.name));
                    bytes_written += write_table_csv(&csv_path, table)?;
                }
                report.bytes_written = bytes_written;
                std::fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;
                info!(
                    run_id = %run_id,
                    tables = report.tables.len(),
                    duration_ms = report.duration_ms,
                    bytes_written = report.bytes_written,
                    "generation completed"
                );
                Ok(GenerationResult {
                    run_dir,
                    report,
                    dataset: registry,
                })
            }
            Err(err) => {
                report.failure = Some(err.to_string());
                std::fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;
                warn!(run_id = %run_id, error = %err, "generation failed");
                Err(err)
            }
        }
    }
}

/// Generate every table in dependency order without touching the
/// filesystem. This is the library surface; [`GenerationEngine::run`] adds
/// the run directory, CSV files and report on top.
pub fn build_dataset(
    tables: &[TableSchema],
    options: &GenerateOptions,
    now: NaiveDateTime,
) -> Result<(TableRegistry, GenerationReport), GenerationError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let mut report = GenerationReport::new(run_id, options.seed);
    let registry = generate_all(tables, options, now, &mut report)?;
    Ok((registry, report))
}

fn generate_all(
    tables: &[TableSchema],
    options: &GenerateOptions,
    now: NaiveDateTime,
    report: &mut GenerationReport,
) -> Result<TableRegistry, GenerationError> {
    validate_tables(tables)?;
    let order = generation_order(tables)?;

    let mut registry = TableRegistry::new();
    for name in &order {
        let schema = tables
            .iter()
            .find(|table| table.name == *name)
            .ok_or_else(|| {
                rowsmith_core::Error::InvalidSchema(format!("table '{name}' missing from input"))
            })?;

        let table_start = Instant::now();
        let table_seed = hash_seed(options.seed, name);
        let mut rng = ChaCha8Rng::seed_from_u64(table_seed);
        info!(table = %name, "generating table");

        let produced = produce_table(schema, &registry, options, now, &mut rng)?;
        report.record_table(TableReport {
            table: name.clone(),
            rows_generated: produced.rows.len() as u64,
            retries: produced.retries,
        });

        info!(
            table = %name,
            rows_generated = produced.rows.len() as u64,
            retries = produced.retries,
            duration_ms = table_start.elapsed().as_millis() as u64,
            "table generated"
        );

        registry.publish(FinalizedTable {
            name: name.clone(),
            columns: schema.field_names(),
            rows: produced.rows,
        })?;
    }

    Ok(registry)
}

struct ProducedTable {
    rows: Vec<Row>,
    retries: u64,
}

struct TableState<'a> {
    schema: &'a TableSchema,
    fields: &'a Fields,
    registry: &'a TableRegistry,
    now: NaiveDateTime,
    counters: TableCounters,
    next_index: u64,
}

/// Per-row generation inputs that vary with the production mode.
struct RowScope<'a> {
    parent: Option<&'a Row>,
    parent_table: Option<&'a str>,
    version: Option<i64>,
}

const DETACHED: RowScope<'static> = RowScope {
    parent: None,
    parent_table: None,
    version: None,
};

fn produce_table(
    schema: &TableSchema,
    registry: &TableRegistry,
    options: &GenerateOptions,
    now: NaiveDateTime,
    rng: &mut ChaCha8Rng,
) -> Result<ProducedTable, GenerationError> {
    if schema.category == TableCategory::Pointer {
        let rows = materialize_pointer(schema, registry)?;
        return Ok(ProducedTable { rows, retries: 0 });
    }

    if let Some(records) = &schema.records {
        let rows = records.iter().map(literal_row).collect();
        return Ok(ProducedTable { rows, retries: 0 });
    }

    let Some(fields) = &schema.fields else {
        // validate_tables rejects this shape before generation starts
        return Ok(ProducedTable {
            rows: Vec::new(),
            retries: 0,
        });
    };

    let mut state = TableState {
        schema,
        fields,
        registry,
        now,
        counters: TableCounters::default(),
        next_index: 0,
    };
    let mut enforcer = UniquenessEnforcer::for_table(&schema.name, options.max_unique_attempts);

    let rows = if schema.parent.is_some() {
        child_rows(&mut state, &mut enforcer, rng)?
    } else if schema.category == TableCategory::Immutable {
        versioned_rows(&mut state, &mut enforcer, rng)?
    } else {
        flat_rows(&mut state, &mut enforcer, rng)?
    };

    Ok(ProducedTable {
        rows,
        retries: enforcer.retries(),
    })
}

fn flat_rows(
    state: &mut TableState<'_>,
    enforcer: &mut UniquenessEnforcer,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Row>, GenerationError> {
    let count = row_count(state.schema);
    let mut rows = Vec::with_capacity(count as usize);
    for _ in 0..count {
        rows.push(generate_row(state, enforcer, &DETACHED, None, rng)?);
    }
    Ok(rows)
}

fn child_rows(
    state: &mut TableState<'_>,
    enforcer: &mut UniquenessEnforcer,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Row>, GenerationError> {
    let parent_name = state.schema.parent.as_deref().unwrap_or_default();
    let registry = state.registry;
    let parent_rows = registry
        .rows(parent_name)
        .ok_or_else(|| GenerationError::ReferenceOrdering {
            table: state.schema.name.clone(),
            target: parent_name.to_string(),
        })?;
    let span = state.schema.count_per_parent.unwrap_or(Span::fixed(1));

    let mut rows = Vec::new();
    for parent_row in parent_rows {
        // detail-line numbering restarts within each parent group
        state.counters.reset_auto();
        let per_parent = sample_span(&span, rng);
        let scope = RowScope {
            parent: Some(parent_row),
            parent_table: Some(parent_name),
            version: None,
        };
        for _ in 0..per_parent {
            rows.push(generate_row(state, enforcer, &scope, None, rng)?);
        }
    }
    Ok(rows)
}

/// Version expander for immutable tables.
///
/// The non-version primary-key fields and any `ref` fields are drawn once
/// per key group; the group then emits one row per version in the range,
/// re-drawing every other generated field and stamping `version_sequence`
/// fields with the version number.
fn versioned_rows(
    state: &mut TableState<'_>,
    enforcer: &mut UniquenessEnforcer,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Row>, GenerationError> {
    let span = state.schema.version_range.unwrap_or(Span::fixed(1));
    let groups = row_count(state.schema);
    let key_fields: HashSet<&str> = state
        .schema
        .primary_key
        .iter()
        .map(String::as_str)
        .filter(|name| {
            !matches!(
                state.fields.get(name).map(|spec| &spec.kind),
                Some(FieldKind::VersionSequence)
            )
        })
        .collect();

    let mut rows = Vec::new();
    for _ in 0..groups {
        let mut stable = Row::new();
        for field in state.fields {
            let keep = key_fields.contains(field.name.as_str())
                || matches!(field.spec.kind, FieldKind::Ref { .. });
            if !keep || matches!(field.spec.kind, FieldKind::VersionSequence) {
                continue;
            }
            let row_index = state.next_index;
            let value = generate_field_value(
                state, enforcer, &DETACHED, &stable, row_index, &field.name, &field.spec, rng,
            )?;
            stable.insert(field.name.clone(), value);
        }

        for version in span.start..=span.end {
            let scope = RowScope {
                parent: None,
                parent_table: None,
                version: Some(version),
            };
            rows.push(generate_row(state, enforcer, &scope, Some(&stable), rng)?);
        }
    }
    Ok(rows)
}

fn generate_row(
    state: &mut TableState<'_>,
    enforcer: &mut UniquenessEnforcer,
    scope: &RowScope<'_>,
    stable: Option<&Row>,
    rng: &mut ChaCha8Rng,
) -> Result<Row, GenerationError> {
    let row_index = state.next_index;
    state.next_index += 1;

    let mut row = Row::new();
    if let Some(stable) = stable {
        for (name, value) in stable {
            row.insert(name.clone(), value.clone());
        }
    }

    for field in state.fields {
        if row.contains_key(&field.name) {
            continue;
        }
        let value = generate_field_value(
            state, enforcer, scope, &row, row_index, &field.name, &field.spec, rng,
        )?;
        row.insert(field.name.clone(), value);
    }
    Ok(row)
}

fn generate_field_value(
    state: &mut TableState<'_>,
    enforcer: &mut UniquenessEnforcer,
    scope: &RowScope<'_>,
    row: &Row,
    row_index: u64,
    name: &str,
    spec: &FieldSpec,
    rng: &mut ChaCha8Rng,
) -> Result<Value, GenerationError> {
    if spec.unique {
        enforcer.reserve(name, || draw_value(state, scope, row, row_index, name, spec, rng))
    } else {
        draw_value(state, scope, row, row_index, name, spec, rng)
    }
}

fn draw_value(
    state: &mut TableState<'_>,
    scope: &RowScope<'_>,
    row: &Row,
    row_index: u64,
    name: &str,
    spec: &FieldSpec,
    rng: &mut ChaCha8Rng,
) -> Result<Value, GenerationError> {
    let mut ctx = FieldContext {
        table: state.schema.name.as_str(),
        row_index,
        row,
        parent: scope.parent,
        parent_table: scope.parent_table,
        version: scope.version,
        registry: state.registry,
        now: state.now,
        counters: &mut state.counters,
    };
    generate_field(name, spec, &mut ctx, rng)
}

fn literal_row(record: &Record) -> Row {
    record
        .iter()
        .map(|(name, literal)| (name.clone(), Value::from(literal)))
        .collect()
}

fn row_count(schema: &TableSchema) -> u64 {
    schema.count.unwrap_or(0).max(0) as u64
}

fn sample_span(span: &Span, rng: &mut ChaCha8Rng) -> u64 {
    let drawn = if span.start == span.end {
        span.start
    } else {
        rng.random_range(span.start..=span.end)
    };
    drawn.max(0) as u64
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
