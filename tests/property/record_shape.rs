// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Record Shape
//!
//! A record is accepted only when it carries one value per key, and lookup by
//! key agrees with lookup by position.

use cim_graph_query::{ExecutionError, Record, Value};
use proptest::prelude::*;
use std::sync::Arc;

fn keys(width: usize) -> Arc<[String]> {
    (0..width).map(|i| format!("k{}", i)).collect::<Vec<_>>().into()
}

proptest! {
    #[test]
    fn prop_matching_width_is_accepted(values in prop::collection::vec(any::<i64>(), 0..16)) {
        let keys = keys(values.len());
        let record = Record::new(keys.clone(), values.iter().copied().map(Value::Integer).collect())
            .expect("widths match");

        prop_assert_eq!(record.len(), keys.len());
        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(record.get(key), record.get_by_index(i));
            prop_assert_eq!(record.get(key), Some(&Value::Integer(values[i])));
        }
    }

    #[test]
    fn prop_mismatched_width_is_rejected(width in 0usize..16, actual in 0usize..16) {
        prop_assume!(width != actual);
        let values = vec![Value::Null; actual];

        prop_assert_eq!(
            Record::new(keys(width), values),
            Err(ExecutionError::RecordWidthMismatch { expected: width, actual })
        );
    }
}
