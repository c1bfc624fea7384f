// Copyright (c) 2025 - Cowboy AI, Inc.
//! Query execution façade
//!
//! [`Driver::execute_query`] runs one query in a retryable managed
//! transaction and hands back the whole result at once:
//!
//! 1. build a [`QueryConfig`] from the options, in order
//! 2. open a session bound to the configured database, user and bookmarks
//! 3. send [`RunQuery`] down the write or read path of the session
//! 4. close the session, whatever happened
//!
//! When both the work and the close fail, the close error is returned and the
//! work error is logged.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{uri_is_encrypted, QueryConfig, QueryOption};
use crate::errors::ExecutionError;
use crate::record::Record;
use crate::result::EagerResult;
use crate::routing::RoutingControl;
use crate::session::{
    ManagedTransaction, Session, SessionConfig, SessionGuard, SessionProvider, TransactionWork,
};
use crate::value::Parameters;

/// Stateless entry point over a session provider
///
/// Cloning is cheap; every clone shares the provider.
pub struct Driver<P: SessionProvider> {
    provider: Arc<P>,
}

impl<P: SessionProvider> Clone for Driver<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: SessionProvider> Driver<P> {
    pub fn new(provider: P) -> Self {
        Self::from_shared(Arc::new(provider))
    }

    pub fn from_shared(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// URI the driver was bootstrapped with
    pub fn target(&self) -> &str {
        self.provider.target()
    }

    /// Static check of the target scheme; also valid after `close`
    pub fn is_encrypted(&self) -> bool {
        uri_is_encrypted(self.provider.target())
    }

    pub async fn verify_connectivity(&self) -> Result<(), P::Error> {
        self.provider.verify_connectivity().await
    }

    /// Open a session for callers that manage transactions themselves
    pub async fn new_session(&self, config: SessionConfig) -> Result<P::Session, P::Error> {
        self.provider.new_session(config).await
    }

    pub async fn close(&self) -> Result<(), P::Error> {
        info!("Closing driver for {}", self.provider.target());
        self.provider.close().await
    }

    /// Run `query` in a retryable transaction and collect the full result
    ///
    /// ```rust,ignore
    /// let result = driver
    ///     .execute_query("MATCH (p:Person) RETURN p.name AS name", params! {}, [with_database("movies")])
    ///     .await?;
    /// ```
    pub async fn execute_query(
        &self,
        query: &str,
        parameters: Parameters,
        options: impl IntoIterator<Item = QueryOption>,
    ) -> Result<EagerResult, P::Error> {
        self.execute_query_with_cancellation(query, parameters, options, std::future::pending())
            .await
    }

    /// Like [`execute_query`](Self::execute_query), aborting when `cancel` completes
    ///
    /// The session is closed on every path, cancellation included.
    pub async fn execute_query_with_cancellation<C>(
        &self,
        query: &str,
        parameters: Parameters,
        options: impl IntoIterator<Item = QueryOption>,
        cancel: C,
    ) -> Result<EagerResult, P::Error>
    where
        C: Future<Output = ()>,
    {
        let config = QueryConfig::from_options(options);
        let routing = config.routing();

        debug!(
            "Opening session (database: {:?}, impersonated user: {:?})",
            config.database(),
            config.impersonated_user()
        );
        let session = self.provider.new_session(session_config(&config)).await?;
        let mut guard = SessionGuard::new(session);

        let work = RunQuery::new(query, &parameters);
        let outcome = {
            let execution = async {
                let session = guard.session_mut().ok_or(ExecutionError::SessionClosed)?;
                let dispatched = dispatch(session, routing, &work);
                match config.timeout() {
                    Some(limit) => match tokio::time::timeout(limit, dispatched).await {
                        Ok(result) => result,
                        Err(_) => Err(ExecutionError::TimedOut(limit).into()),
                    },
                    None => dispatched.await,
                }
            };
            tokio::select! {
                result = execution => result,
                _ = cancel => Err(ExecutionError::Cancelled.into()),
            }
        };

        let closed = guard.close().await;
        match (outcome, closed) {
            (Ok(result), Ok(())) => {
                debug!(
                    "Query returned {} records from {}",
                    result.records().len(),
                    result.summary().database
                );
                Ok(result)
            }
            (Ok(_), Err(close_error)) => Err(close_error),
            (Err(work_error), Ok(())) => Err(work_error),
            (Err(work_error), Err(close_error)) => {
                warn!(
                    "Query failed ({}) and closing the session failed too; returning the close error",
                    work_error
                );
                Err(close_error)
            }
        }
    }
}

fn session_config(config: &QueryConfig) -> SessionConfig {
    SessionConfig {
        database: config.database().map(str::to_string),
        impersonated_user: config.impersonated_user().map(str::to_string),
        bookmark_manager: config.bookmark_manager().cloned(),
    }
}

/// Send `work` down the path selected by `routing`
async fn dispatch<S, W>(session: &mut S, routing: RoutingControl, work: &W) -> Result<W::Output, S::Error>
where
    S: Session,
    W: TransactionWork<S::Transaction>,
{
    debug!("Dispatching unit of work to {} path", routing);
    match routing {
        RoutingControl::Writers => session.execute_write(work).await,
        RoutingControl::Readers => session.execute_read(work).await,
    }
}

/// Unit of work that runs one query and materializes its result
///
/// Runs the query, reads the keys, pulls every row and consumes the summary.
/// A failure at any step fails the whole unit; nothing partial escapes.
pub struct RunQuery<'q> {
    query: &'q str,
    parameters: &'q Parameters,
}

impl<'q> RunQuery<'q> {
    pub fn new(query: &'q str, parameters: &'q Parameters) -> Self {
        Self { query, parameters }
    }
}

#[async_trait]
impl<'q, Tx> TransactionWork<Tx> for RunQuery<'q>
where
    Tx: ManagedTransaction,
    Tx::Error: From<ExecutionError>,
{
    type Output = EagerResult;

    async fn run(&self, tx: &mut Tx) -> Result<EagerResult, Tx::Error> {
        tx.run(self.query, self.parameters).await?;

        let keys = tx.keys().await?;
        let shared: Arc<[String]> = keys.clone().into();

        let mut records = Vec::new();
        while let Some(row) = tx.next_row().await? {
            records.push(Record::new(Arc::clone(&shared), row)?);
        }

        let summary = tx.consume().await?;
        Ok(EagerResult::new(keys, records, summary))
    }
}
