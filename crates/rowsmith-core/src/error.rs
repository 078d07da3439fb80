use thiserror::Error;

/// Core error type shared across Rowsmith crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A table declaration violates the schema contract.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A `ref`, `parent` or `source_table` names a table that was never declared.
    #[error("table '{table}' references undeclared table '{referenced}'")]
    UnknownTableReference { table: String, referenced: String },
    /// The dependency graph contains a cycle; the named tables cannot be ordered.
    #[error("cyclic dependency among tables: {}", .tables.join(", "))]
    CyclicDependencies { tables: Vec<String> },
}

/// Convenience alias for results returned by Rowsmith crates.
pub type Result<T> = std::result::Result<T, Error>;
