// Copyright (c) 2025 - Cowboy AI, Inc.

//! Session provider implementations
//!
//! Concrete [`SessionProvider`](crate::session::SessionProvider)s for
//! specific database client libraries.

#[cfg(feature = "neo4j")]
pub mod neo4j;

#[cfg(feature = "neo4j")]
pub use neo4j::{Neo4jError, Neo4jSession, Neo4jSessionProvider, Neo4jTransaction};
