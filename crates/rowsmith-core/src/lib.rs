//! Core contracts and helpers for Rowsmith.
//!
//! This crate defines the table schema types loaded from YAML, the
//! cross-table validation rules, and the dependency resolver that orders
//! table generation. The generation engine itself lives in
//! `rowsmith-generate`.

pub mod error;
pub mod graph;
pub mod pattern;
pub mod schema;
pub mod validation;

pub use error::{Error, Result};
pub use graph::generation_order;
pub use pattern::{PatternSegment, parse_pattern};
pub use schema::{
    Field, FieldKind, FieldSpec, Fields, Literal, OneOrMany, Record, Span, TableCategory,
    TableSchema,
};
pub use validation::validate_tables;

/// Current contract version for table schema documents.
pub const SCHEMA_VERSION: &str = "0.1";
