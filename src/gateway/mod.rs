//! The database surface the loader drives.

pub mod memory;
pub mod mysql;

use crate::encoder::Statement;
use crate::error::GatewayError;
use crate::spec::TableRef;
use async_trait::async_trait;

pub use memory::MemoryGateway;
pub use mysql::MySqlGateway;

/// Shape of a load table: `CHAR(string_length)` string columns on `engine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub table: TableRef,
    pub engine: String,
    pub string_length: usize,
}

#[async_trait]
pub trait DatabaseGateway: Send + Sync {
    /// Round-trips the server to prove the connection works.
    async fn ping(&self) -> Result<(), GatewayError> {
        self.query_scalar("SELECT 1").await.map(|_| ())
    }

    /// Create-if-absent.
    async fn create_database(&self, name: &str) -> Result<(), GatewayError>;

    /// Create-if-absent. With `reset`, an existing table is dropped first.
    async fn create_table(&self, def: &TableDef, reset: bool) -> Result<(), GatewayError>;

    /// Runs a statement and returns the rows affected.
    async fn execute(&self, statement: &Statement) -> Result<u64, GatewayError>;

    async fn query_scalar(&self, sql: &str) -> Result<i64, GatewayError>;

    async fn count_rows(&self, table: &TableRef) -> Result<u64, GatewayError> {
        let count = self
            .query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Maximum number of connections the gateway keeps open at once.
    fn connection_limit(&self) -> u32;
}
