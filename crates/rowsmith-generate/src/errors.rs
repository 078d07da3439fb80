use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Schema validation or dependency resolution failed.
    #[error(transparent)]
    Schema(#[from] rowsmith_core::Error),
    /// An `int` field's bounds are inverted.
    #[error("int field '{table}.{field}' has an empty range ({min} > {max})")]
    InvalidRange {
        table: String,
        field: String,
        min: i64,
        max: i64,
    },
    /// A `ref` field targets a finalized table with zero rows.
    #[error("field '{table}.{field}' references table '{target}' which produced no rows")]
    EmptyReferenceTarget {
        table: String,
        field: String,
        target: String,
    },
    /// A table was read before it was generated; the generation order is broken.
    #[error("table '{table}' read from '{target}' before it was generated")]
    ReferenceOrdering { table: String, target: String },
    /// The uniqueness retry budget ran out; the declared row count is too
    /// large for the field's value domain.
    #[error(
        "exhausted uniqueness budget for '{table}.{field}' after {attempts} attempts; \
         declare fewer rows or widen the field's value domain"
    )]
    UniquenessExhausted {
        table: String,
        field: String,
        attempts: u32,
    },
    /// A table was published to the registry twice.
    #[error("table '{0}' was already finalized")]
    AlreadyFinalized(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
