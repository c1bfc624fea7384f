// Copyright (c) 2025 - Cowboy AI, Inc.
//! Eager, routing-aware query execution over graph database sessions
//!
//! This crate adds one convenience call on top of a session-oriented graph
//! database driver: [`Driver::execute_query`]. It opens a session, runs the
//! query inside a managed transaction on the write or read path, pulls every
//! record into memory together with the run summary, and always closes the
//! session before returning.
//!
//! ```text
//! execute_query(query, params, options)
//!        │
//!        ▼
//!   QueryConfig ──> SessionProvider::new_session
//!        │                  │
//!        │ RoutingControl   ▼
//!        ├── Writers ──> Session::execute_write(RunQuery)
//!        └── Readers ──> Session::execute_read(RunQuery)
//!                           │  (retried by the session)
//!                           ▼
//!                      EagerResult { keys, records, summary }
//! ```
//!
//! Connection handling, routing tables and the wire protocol belong to the
//! [`SessionProvider`] implementation. With the `neo4j` feature enabled,
//! [`adapters::Neo4jSessionProvider`] provides one on top of `neo4rs`.
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_graph_query::{params, Driver, Neo4jConfig};
//! use cim_graph_query::adapters::Neo4jSessionProvider;
//! use cim_graph_query::config::with_database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Neo4jSessionProvider::connect(Neo4jConfig::default()).await?;
//!     let driver = Driver::new(provider);
//!
//!     let result = driver
//!         .execute_query("UNWIND [1, 2] AS value RETURN value", params! {}, [with_database("neo4j")])
//!         .await?;
//!     println!("{}", result);
//!
//!     driver.close().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod bookmarks;
pub mod config;
#[cfg(feature = "container")]
pub mod container;
pub mod driver;
pub mod errors;
pub mod record;
pub mod result;
pub mod retry;
pub mod routing;
pub mod session;
pub mod value;

// Re-export commonly used types
pub use bookmarks::{Bookmark, BookmarkManager, InMemoryBookmarkManager};
pub use config::{Neo4jConfig, QueryConfig, QueryOption};
pub use driver::{Driver, RunQuery};
pub use errors::{ConfigError, ConfigResult, ExecutionError};
pub use record::Record;
pub use result::{EagerResult, ProtocolVersion, ResultSummary, ServerInfo};
pub use retry::{RetryPolicy, Retryable};
pub use routing::RoutingControl;
pub use session::{
    ManagedTransaction, Session, SessionConfig, SessionGuard, SessionProvider, TransactionWork,
};
pub use value::{Node, Parameters, Path, Relationship, Value};
