//! In-process gateway used for dry runs, tests and benches.

use super::{DatabaseGateway, TableDef};
use crate::encoder::{Statement, StatementKind};
use crate::error::GatewayError;
use crate::spec::TableRef;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedInsert {
    pub table: TableRef,
    pub rows: usize,
}

#[derive(Default)]
struct State {
    databases: HashSet<String>,
    tables: HashMap<TableRef, u64>,
    inserts: Vec<ExecutedInsert>,
    ddl_count: usize,
}

/// Keeps databases and per-table row counters in memory.
///
/// Concurrent executions are bounded by the connection limit, like a real
/// pool. Insert attempts can be made to fail for fault-injection tests.
pub struct MemoryGateway {
    state: Mutex<State>,
    connections: Semaphore,
    max_connections: u32,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    fail_on_attempt: Option<usize>,
    delay: Option<Duration>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub const DEFAULT_CONNECTIONS: u32 = 100;

    pub fn new() -> Self {
        Self::with_connection_limit(Self::DEFAULT_CONNECTIONS)
    }

    pub fn with_connection_limit(max_connections: u32) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            state: Mutex::new(State::default()),
            connections: Semaphore::new(max_connections as usize),
            max_connections,
            attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            fail_on_attempt: None,
            delay: None,
        }
    }

    /// The `attempt`-th insert (1-based, in arrival order) fails.
    pub fn fail_on_attempt(mut self, attempt: usize) -> Self {
        self.fail_on_attempt = Some(attempt);
        self
    }

    /// Every insert holds its connection for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Insert attempts seen so far, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub async fn inserts(&self) -> Vec<ExecutedInsert> {
        self.state.lock().await.inserts.clone()
    }

    pub async fn table_count(&self) -> usize {
        self.state.lock().await.tables.len()
    }

    pub async fn database_count(&self) -> usize {
        self.state.lock().await.databases.len()
    }

    pub async fn ddl_count(&self) -> usize {
        self.state.lock().await.ddl_count
    }

    /// Adds rows behind the loader's back, as a concurrent writer would.
    pub async fn insert_external(&self, table: &TableRef, rows: u64) {
        *self
            .state
            .lock()
            .await
            .tables
            .entry(table.clone())
            .or_default() += rows;
    }

    async fn insert(&self, table: &TableRef, rows: usize) -> Result<u64, GatewayError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| GatewayError::Rejected("connection pool closed".into()))?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on_attempt == Some(attempt) {
            Err(GatewayError::Injected(format!(
                "insert attempt {attempt} into {table}"
            )))
        } else {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            match state.tables.get_mut(table) {
                Some(count) => {
                    *count += rows as u64;
                    state.inserts.push(ExecutedInsert {
                        table: table.clone(),
                        rows,
                    });
                    Ok(rows as u64)
                }
                None => Err(GatewayError::Rejected(format!(
                    "table {table} doesn't exist"
                ))),
            }
        }
    }
}

// Decrements on drop so cancelled inserts are not counted as running.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatabaseGateway for MemoryGateway {
    async fn create_database(&self, name: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        state.ddl_count += 1;
        state.databases.insert(name.to_string());
        Ok(())
    }

    async fn create_table(&self, def: &TableDef, reset: bool) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        if !state.databases.contains(&def.table.database) {
            return Err(GatewayError::Rejected(format!(
                "unknown database {}",
                def.table.database
            )));
        }
        state.ddl_count += 1;
        if reset {
            state.tables.remove(&def.table);
        }
        state.tables.entry(def.table.clone()).or_insert(0);
        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, GatewayError> {
        match &statement.kind {
            StatementKind::Insert { table, rows } => self.insert(table, *rows).await,
            StatementKind::Ddl => {
                self.state.lock().await.ddl_count += 1;
                Ok(0)
            }
        }
    }

    async fn query_scalar(&self, sql: &str) -> Result<i64, GatewayError> {
        if sql.trim() == "SELECT 1" {
            return Ok(1);
        }
        let target = sql
            .strip_prefix("SELECT COUNT(*) FROM ")
            .ok_or_else(|| GatewayError::Rejected(format!("unsupported query: {sql}")))?;

        let state = self.state.lock().await;
        state
            .tables
            .iter()
            .find(|(table, _)| table.to_string() == target)
            .map(|(_, count)| *count as i64)
            .ok_or_else(|| GatewayError::Rejected(format!("table {target} doesn't exist")))
    }

    fn connection_limit(&self) -> u32 {
        self.max_connections
    }
}
