// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Option application order and record shape invariants.

mod query_options;
mod record_shape;
