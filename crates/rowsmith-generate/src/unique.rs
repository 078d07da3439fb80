use std::collections::{HashMap, HashSet};

use crate::errors::GenerationError;
use crate::values::Value;

/// Tracks issued values for the unique-marked fields of one table.
///
/// Each `reserve` call draws candidates until one has not been issued for
/// the field, within a fixed retry budget. Exhausting the budget is a
/// deterministic, typed failure rather than an open-ended loop.
#[derive(Debug)]
pub struct UniquenessEnforcer {
    table: String,
    issued: HashMap<String, HashSet<String>>,
    max_attempts: u32,
    retries: u64,
}

impl UniquenessEnforcer {
    pub fn for_table(table: &str, max_attempts: u32) -> Self {
        Self {
            table: table.to_string(),
            issued: HashMap::new(),
            max_attempts: max_attempts.max(1),
            retries: 0,
        }
    }

    /// Draw candidates from `candidate` until one is new for `field`.
    pub fn reserve<F>(&mut self, field: &str, mut candidate: F) -> Result<Value, GenerationError>
    where
        F: FnMut() -> Result<Value, GenerationError>,
    {
        let seen = self.issued.entry(field.to_string()).or_default();
        for _ in 0..self.max_attempts {
            let value = candidate()?;
            if seen.insert(value.key()) {
                return Ok(value);
            }
            self.retries += 1;
        }
        Err(GenerationError::UniquenessExhausted {
            table: self.table.clone(),
            field: field.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Collisions encountered so far, for run reporting.
    pub fn retries(&self) -> u64 {
        self.retries
    }
}
