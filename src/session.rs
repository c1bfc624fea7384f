// Copyright (c) 2025 - Cowboy AI, Inc.
//! Session provider and transactional executor abstractions
//!
//! The query façade never talks to the network itself. It asks a
//! [`SessionProvider`] for a [`Session`], and hands the session a
//! [`TransactionWork`] to run on its write or read path. Retrying the work on
//! transient failures is the session's job.
//!
//! ```text
//! Driver ──new_session──> SessionProvider
//!   │                          │
//!   │ execute_write/read       │ Session
//!   ▼                          ▼
//! TransactionWork ──run──> ManagedTransaction
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::bookmarks::BookmarkManager;
use crate::errors::ExecutionError;
use crate::result::ResultSummary;
use crate::value::{Parameters, Value};

/// What a session is bound to
#[derive(Clone, Default)]
pub struct SessionConfig {
    /// Target database, `None` for the provider default
    pub database: Option<String>,
    /// User to impersonate
    pub impersonated_user: Option<String>,
    /// Bookmark manager shared with the caller
    pub bookmark_manager: Option<Arc<dyn BookmarkManager>>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_impersonated_user(mut self, user: impl Into<String>) -> Self {
        self.impersonated_user = Some(user.into());
        self
    }

    pub fn with_bookmark_manager(mut self, manager: Arc<dyn BookmarkManager>) -> Self {
        self.bookmark_manager = Some(manager);
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("database", &self.database)
            .field("impersonated_user", &self.impersonated_user)
            .field("bookmark_manager", &self.bookmark_manager.is_some())
            .finish()
    }
}

/// A transaction managed by the executor
///
/// Each transaction runs one result at a time: `run` starts it, `keys` and
/// `next_row` read it, `consume` discards what is left and returns the summary.
#[async_trait]
pub trait ManagedTransaction: Send {
    type Error: Send;

    /// Start a query in this transaction
    async fn run(&mut self, query: &str, parameters: &Parameters) -> Result<(), Self::Error>;

    /// Projected keys of the running query
    async fn keys(&mut self) -> Result<Vec<String>, Self::Error>;

    /// Pull the next row of values, `None` once the result is exhausted
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, Self::Error>;

    /// Finish the running query and return its summary
    async fn consume(&mut self) -> Result<ResultSummary, Self::Error>;
}

/// A unit of work the executor may run more than once
#[async_trait]
pub trait TransactionWork<Tx: ManagedTransaction>: Send + Sync {
    type Output: Send;

    async fn run(&self, tx: &mut Tx) -> Result<Self::Output, Tx::Error>;
}

/// A session bound to a database, identity and bookmark policy
///
/// `execute_write` and `execute_read` are the executor: they run the unit of
/// work in a managed transaction, retrying it under the session's retry
/// policy, and commit on success.
#[async_trait]
pub trait Session: Send {
    type Error: std::error::Error + From<ExecutionError> + Send + Sync + 'static;
    type Transaction: ManagedTransaction<Error = Self::Error>;

    async fn execute_write<W>(&mut self, work: &W) -> Result<W::Output, Self::Error>
    where
        W: TransactionWork<Self::Transaction>;

    async fn execute_read<W>(&mut self, work: &W) -> Result<W::Output, Self::Error>
    where
        W: TransactionWork<Self::Transaction>;

    /// Release the session's resources
    async fn close(&mut self) -> Result<(), Self::Error>;
}

/// Creates sessions and owns the connections behind them
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Error: std::error::Error + From<ExecutionError> + Send + Sync + 'static;
    type Session: Session<Error = Self::Error> + 'static;

    async fn new_session(&self, config: SessionConfig) -> Result<Self::Session, Self::Error>;

    /// URI the provider was bootstrapped with
    fn target(&self) -> &str;

    /// Check that a server can be reached
    async fn verify_connectivity(&self) -> Result<(), Self::Error>;

    /// Release every connection
    async fn close(&self) -> Result<(), Self::Error>;
}

/// Owns an open session and guarantees it gets closed
///
/// `close` is the normal path. If the guard is dropped while the session is
/// still open (the call was cancelled or unwound), the close is spawned on the
/// current tokio runtime.
pub struct SessionGuard<S: Session + 'static> {
    session: Option<S>,
}

impl<S: Session + 'static> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// The guarded session; `None` only after `close`
    pub fn session_mut(&mut self) -> Option<&mut S> {
        self.session.as_mut()
    }

    /// Close the session now
    pub async fn close(mut self) -> Result<(), S::Error> {
        match self.session.take() {
            Some(mut session) => {
                debug!("Closing session");
                session.close().await
            }
            None => Ok(()),
        }
    }
}

impl<S: Session + 'static> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Session dropped while open, closing in background");
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        error!("Failed to close abandoned session: {}", e);
                    }
                });
            }
            Err(_) => error!("Session dropped outside a tokio runtime, it was not closed"),
        }
    }
}
