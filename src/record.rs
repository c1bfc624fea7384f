// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query result records

use std::sync::Arc;

use crate::errors::ExecutionError;
use crate::value::Value;

/// A single result row, mapping projected keys to values
///
/// All records of one result share the same key list.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    keys: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// Pair a row of values with the result's keys
    ///
    /// Fails when the row is wider or narrower than the key list.
    pub fn new(keys: Arc<[String]>, values: Vec<Value>) -> Result<Self, ExecutionError> {
        if keys.len() != values.len() {
            return Err(ExecutionError::RecordWidthMismatch {
                expected: keys.len(),
                actual: values.len(),
            });
        }
        Ok(Self { keys, values })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keys
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.values.get(i))
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Iterate over `(key, value)` pairs in projection order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
