// Copyright (c) 2025 - Cowboy AI, Inc.
//! Eagerly materialized query results
//!
//! An [`EagerResult`] is built once, after the whole result has been pulled
//! and the run consumed, and is never mutated afterwards. Its `Display`
//! implementation is a deterministic diagnostic rendering:
//!
//! ```text
//! keys: [name age], records: {"name": Alice,"age": 42}, summary: {"db": "neo4j", "address": "localhost:7687", "protocol_version": "5.0", "agent": "Neo4j/5.12.0"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

use crate::record::Record;

/// Placeholder rendered for a key whose value cannot be found in a record
pub const MISSING_VALUE: &str = "<N/A>";

/// Negotiated protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The server a query ran against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// `host:port` of the server
    pub address: String,
    /// Server agent string, e.g. `Neo4j/5.12.0`
    pub agent: String,
    pub protocol_version: ProtocolVersion,
}

/// Summary of a consumed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Database the query actually ran in
    pub database: String,
    pub server: ServerInfo,
}

/// Immutable snapshot of a completed query
#[derive(Debug, Clone, PartialEq)]
pub struct EagerResult {
    keys: Vec<String>,
    records: Vec<Record>,
    summary: ResultSummary,
}

impl EagerResult {
    pub fn new(keys: Vec<String>, records: Vec<Record>, summary: ResultSummary) -> Self {
        Self {
            keys,
            records,
            summary,
        }
    }

    /// Projected column names, in projection order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn summary(&self) -> &ResultSummary {
        &self.summary
    }

    /// Take ownership of the parts
    pub fn into_parts(self) -> (Vec<String>, Vec<Record>, ResultSummary) {
        (self.keys, self.records, self.summary)
    }
}

fn render_keys(f: &mut fmt::Formatter<'_>, keys: &[String]) -> fmt::Result {
    write!(f, "[{}]", keys.join(" "))
}

fn render_records(f: &mut fmt::Formatter<'_>, records: &[Record]) -> fmt::Result {
    for record in records {
        f.write_char('{')?;
        for (i, key) in record.keys().iter().enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            match record.get(key) {
                Some(value) => write!(f, "{:?}: {}", key, value)?,
                None => write!(f, "{:?}: {}", key, MISSING_VALUE)?,
            }
        }
        f.write_char('}')?;
    }
    Ok(())
}

fn render_summary(f: &mut fmt::Formatter<'_>, summary: &ResultSummary) -> fmt::Result {
    write!(
        f,
        r#"{{"db": {:?}, "address": {:?}, "protocol_version": "{}", "agent": {:?}}}"#,
        summary.database,
        summary.server.address,
        summary.server.protocol_version,
        summary.server.agent,
    )
}

impl fmt::Display for EagerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("keys: ")?;
        render_keys(f, &self.keys)?;
        f.write_str(", records: ")?;
        render_records(f, &self.records)?;
        f.write_str(", summary: ")?;
        render_summary(f, &self.summary)
    }
}
