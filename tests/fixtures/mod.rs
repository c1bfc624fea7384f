// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-graph-query
//!
//! Provides a scripted, in-memory session provider that records every call
//! the query façade makes. Each [`Script`] describes what the "database"
//! returns and which step should fail; [`Calls`] counts what happened.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use cim_graph_query::{
    ExecutionError, ManagedTransaction, Parameters, ProtocolVersion, ResultSummary, RetryPolicy,
    Retryable, ServerInfo, Session, SessionConfig, SessionProvider, TransactionWork, Value,
};

pub const DEFAULT_DATABASE: &str = "neo4j";
pub const SERVER_ADDRESS: &str = "localhost:7687";
pub const SERVER_AGENT: &str = "Neo4j/5.12.0";

/// Errors produced by the scripted provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FakeError {
    #[error("session open failed")]
    Open,
    #[error("query failed: {0}")]
    Query(String),
    #[error("transient failure")]
    Transient,
    #[error("session close failed")]
    Close,
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl Retryable for FakeError {
    fn is_retryable(&self) -> bool {
        matches!(self, FakeError::Transient)
    }
}

/// What the scripted database does
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub keys: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub fail_open: bool,
    pub fail_close: bool,
    /// Fails `run` with this error on every attempt
    pub fail_query: Option<FakeError>,
    /// Fails pulling the row at this index
    pub fail_pull_at: Option<usize>,
    /// Number of leading attempts that fail with a transient error
    pub transient_failures: usize,
    /// Never complete the unit of work
    pub hang: bool,
    /// Panic inside `run`
    pub panic_in_run: bool,
}

impl Script {
    /// The result of `RETURN 42`
    pub fn return_42() -> Self {
        Self::rows(&["42"], vec![vec![Value::Integer(42)]])
    }

    pub fn rows(keys: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            rows,
            ..Self::default()
        }
    }
}

/// Everything the façade asked of the provider
#[derive(Debug, Default)]
pub struct Calls {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub writes: AtomicUsize,
    pub reads: AtomicUsize,
    pub attempts: AtomicUsize,
    pub session_configs: Mutex<Vec<SessionConfig>>,
    pub parameters: Mutex<Vec<Parameters>>,
}

impl Calls {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn last_session_config(&self) -> SessionConfig {
        self.session_configs
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no session was opened")
    }
}

/// Scripted session provider
pub struct FakeProvider {
    script: Arc<Script>,
    calls: Arc<Calls>,
    target: String,
}

impl FakeProvider {
    pub fn new(script: Script) -> Self {
        Self::with_target(script, "bolt://localhost:7687")
    }

    pub fn with_target(script: Script, target: &str) -> Self {
        Self {
            script: Arc::new(script),
            calls: Arc::new(Calls::default()),
            target: target.to_string(),
        }
    }

    pub fn calls(&self) -> Arc<Calls> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    type Error = FakeError;
    type Session = FakeSession;

    async fn new_session(&self, config: SessionConfig) -> Result<FakeSession, FakeError> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        self.calls.session_configs.lock().unwrap().push(config.clone());

        if self.script.fail_open {
            return Err(FakeError::Open);
        }

        Ok(FakeSession {
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
            database: config
                .database
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        })
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn verify_connectivity(&self) -> Result<(), FakeError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), FakeError> {
        Ok(())
    }
}

pub struct FakeSession {
    script: Arc<Script>,
    calls: Arc<Calls>,
    database: String,
}

impl FakeSession {
    async fn execute<W>(&mut self, work: &W) -> Result<W::Output, FakeError>
    where
        W: TransactionWork<FakeTransaction>,
    {
        if self.script.hang {
            std::future::pending::<()>().await;
        }

        let policy = RetryPolicy::default().with_initial_delay(Duration::ZERO);
        let script = &self.script;
        let calls = &self.calls;
        let database = &self.database;

        policy
            .run(move || async move {
                let attempt = calls.attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < script.transient_failures {
                    return Err(FakeError::Transient);
                }
                let mut tx = FakeTransaction {
                    script: Arc::clone(script),
                    calls: Arc::clone(calls),
                    database: database.clone(),
                    cursor: 0,
                };
                work.run(&mut tx).await
            })
            .await
    }
}

#[async_trait]
impl Session for FakeSession {
    type Error = FakeError;
    type Transaction = FakeTransaction;

    async fn execute_write<W>(&mut self, work: &W) -> Result<W::Output, FakeError>
    where
        W: TransactionWork<FakeTransaction>,
    {
        self.calls.writes.fetch_add(1, Ordering::SeqCst);
        self.execute(work).await
    }

    async fn execute_read<W>(&mut self, work: &W) -> Result<W::Output, FakeError>
    where
        W: TransactionWork<FakeTransaction>,
    {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        self.execute(work).await
    }

    async fn close(&mut self) -> Result<(), FakeError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_close {
            Err(FakeError::Close)
        } else {
            Ok(())
        }
    }
}

pub struct FakeTransaction {
    script: Arc<Script>,
    calls: Arc<Calls>,
    database: String,
    cursor: usize,
}

#[async_trait]
impl ManagedTransaction for FakeTransaction {
    type Error = FakeError;

    async fn run(&mut self, _query: &str, parameters: &Parameters) -> Result<(), FakeError> {
        self.calls.parameters.lock().unwrap().push(parameters.clone());
        if self.script.panic_in_run {
            panic!("unit of work panicked");
        }
        match &self.script.fail_query {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn keys(&mut self) -> Result<Vec<String>, FakeError> {
        Ok(self.script.keys.clone())
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, FakeError> {
        if self.script.fail_pull_at == Some(self.cursor) {
            return Err(FakeError::Query("connection lost while streaming".to_string()));
        }
        let row = self.script.rows.get(self.cursor).cloned();
        self.cursor += 1;
        Ok(row)
    }

    async fn consume(&mut self) -> Result<ResultSummary, FakeError> {
        Ok(ResultSummary {
            database: self.database.clone(),
            server: ServerInfo {
                address: SERVER_ADDRESS.to_string(),
                agent: SERVER_AGENT.to_string(),
                protocol_version: ProtocolVersion::new(5, 0),
            },
        })
    }
}
