use std::collections::HashMap;

use crate::errors::GenerationError;
use crate::values::Value;

/// One generated row: field name to value.
pub type Row = HashMap<String, Value>;

/// A finalized table: its declared column order and its rows.
#[derive(Debug, Clone)]
pub struct FinalizedTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Run-scoped store of finalized tables.
///
/// The registry is the only shared state of a generation run. Each table
/// is published exactly once, after which its rows are read-only; `ref`
/// fields and the pointer materializer only ever see finalized tables.
/// There is no process-wide instance, so independent runs never interact.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: HashMap<String, FinalizedTable>,
    order: Vec<String>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a finalized table. Re-publishing a name is an internal
    /// invariant violation and fails.
    pub fn publish(&mut self, table: FinalizedTable) -> Result<(), GenerationError> {
        if self.tables.contains_key(&table.name) {
            return Err(GenerationError::AlreadyFinalized(table.name));
        }
        self.order.push(table.name.clone());
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Rows of a finalized table, or `None` if it has not been published.
    pub fn rows(&self, name: &str) -> Option<&[Row]> {
        self.tables.get(name).map(|table| table.rows.as_slice())
    }

    pub fn table(&self, name: &str) -> Option<&FinalizedTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Finalized tables in publication order.
    pub fn tables(&self) -> impl Iterator<Item = &FinalizedTable> {
        self.order.iter().filter_map(|name| self.tables.get(name))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
