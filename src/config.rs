//! Command line and environment surface of the `brimming` binary.

use crate::encoder::EncodingPolicy;
use crate::error::{LoadError, Result};
use crate::pool::{FailurePolicy, WorkerOptions};
use crate::row::DEFAULT_STRING_LENGTH;
use crate::schema::SchemaOptions;
use crate::size::size_to_rows;
use crate::spec::{LoadSpec, LoadSpecBuilder, Partitioning, TableIndexing};
use clap::Parser;
use sqlx::mysql::MySqlConnectOptions;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "brimming")]
#[command(version, about = "Fill MySQL/MariaDB tables with synthetic rows as fast as possible")]
pub struct Args {
    /// Path to MariaDB server socket, used when host is localhost
    #[arg(long, env = "BRIM_SOCKET", default_value = "/run/mysqld/mysqld.sock")]
    pub socket: PathBuf,

    /// MariaDB hostname or IP address
    #[arg(short = 'H', long, env = "BRIM_HOST", default_value = "localhost")]
    pub host: String,

    /// MariaDB TCP/IP port
    #[arg(short = 'P', long, env = "BRIM_PORT", default_value_t = 3306)]
    pub port: u16,

    /// MariaDB username
    #[arg(short = 'u', long, env = "BRIM_USER", default_value = "root")]
    pub user: String,

    /// MariaDB password
    #[arg(short = 'p', long, env = "BRIM_PASSWORD")]
    pub password: Option<String>,

    /// Database to use when creating tables
    #[arg(short = 'D', long, env = "BRIM_DB", default_value = LoadSpecBuilder::DEFAULT_DATABASE)]
    pub database: String,

    /// Engine to use when creating tables
    #[arg(short = 'e', long, env = "BRIM_ENGINE", default_value = "InnoDB")]
    pub engine: String,

    /// Size of the dataset loaded across all tables, e.g. 100MB, 123GB, 2.4TB. Overrides --rows
    #[arg(long, env = "BRIM_SIZE")]
    pub size: Option<String>,

    /// Total number of rows inserted across all tables. Each row is around 1 kilobyte
    #[arg(long, env = "BRIM_ROWS", default_value_t = LoadSpecBuilder::DEFAULT_TOTAL_ROWS)]
    pub rows: u64,

    /// Number of rows to insert per batch
    #[arg(long, env = "BRIM_BATCH", default_value_t = LoadSpecBuilder::DEFAULT_BATCH_SIZE)]
    pub batch: usize,

    /// Number of tables to distribute inserts between
    #[arg(long, env = "BRIM_TABLES", default_value_t = LoadSpecBuilder::DEFAULT_TABLES)]
    pub tables: usize,

    /// Number of concurrent workers inserting row batches
    #[arg(long, env = "BRIM_THREADS", default_value_t = LoadSpecBuilder::DEFAULT_WORKERS)]
    pub threads: usize,

    /// Maximum open connections, defaults to the number of workers
    #[arg(long, env = "BRIM_CONNECTIONS")]
    pub connections: Option<u32>,

    /// Prefix of the generated table names
    #[arg(long, env = "BRIM_TABLE_PREFIX", default_value = "brim")]
    pub table_prefix: String,

    /// How rows are spread over tables
    #[arg(long, value_enum, default_value_t = Partitioning::RoundRobin)]
    pub partitioning: Partitioning,

    /// Whether table names start at 1 or 0
    #[arg(long, value_enum, default_value_t = TableIndexing::OneBased)]
    pub table_indexing: TableIndexing,

    /// Drop existing tables before creating them
    #[arg(long, env = "BRIM_DROP_TABLES")]
    pub drop_tables: bool,

    /// Skip counting rows after the load
    #[arg(long, env = "BRIM_SKIP_VERIFY")]
    pub skip_verify: bool,

    /// How row batches are sent to the server
    #[arg(long, value_enum, default_value_t = EncodingPolicy::Bound)]
    pub encoding: EncodingPolicy,

    /// What to do when a batch insert fails
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
    pub on_error: FailurePolicy,

    /// Seed for reproducible row data
    #[arg(long, env = "BRIM_SEED")]
    pub seed: Option<u64>,

    /// Length of each generated string column
    #[arg(long, default_value_t = DEFAULT_STRING_LENGTH)]
    pub string_length: usize,

    /// Run against an in-memory database instead of a server
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Args {
    pub fn total_rows(&self) -> Result<u64> {
        match self.size.as_deref() {
            Some(size) if !size.is_empty() => size_to_rows(size),
            _ => Ok(self.rows),
        }
    }

    pub fn load_spec(&self) -> Result<LoadSpec> {
        LoadSpecBuilder::new(&self.table_prefix)
            .database(&self.database)
            .total_rows(self.total_rows()?)
            .batch_size(self.batch)
            .tables(self.tables)
            .workers(self.threads)
            .partitioning(self.partitioning)
            .indexing(self.table_indexing)
            .build()
    }

    pub fn schema_options(&self) -> Result<SchemaOptions> {
        SchemaOptions::new(&self.engine, self.string_length, self.drop_tables)
    }

    pub fn worker_options(&self) -> Result<WorkerOptions> {
        self.encoding.check_batch_size(self.batch)?;
        Ok(WorkerOptions {
            encoding: self.encoding,
            failure_policy: self.on_error,
            seed: self.seed,
            string_length: self.string_length,
        })
    }

    pub fn connections(&self) -> Result<u32> {
        match self.connections {
            Some(0) => Err(LoadError::config("connection limit must be at least 1")),
            Some(n) => Ok(n),
            None => Ok(u32::try_from(self.threads.max(1)).unwrap_or(u32::MAX)),
        }
    }

    /// TCP for a remote host, the Unix socket for `localhost`. No database
    /// is selected since it may not exist yet.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new().username(&self.user);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        if self.host == "localhost" {
            options.socket(&self.socket)
        } else {
            options.host(&self.host).port(self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("brimming").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_builder() {
        let args = parse(&[]);
        let spec = args.load_spec().unwrap();
        assert_eq!(spec.total_rows, 1_000_000);
        assert_eq!(spec.batch_size, 1000);
        assert_eq!(spec.tables, 1);
        assert_eq!(spec.workers, 100);
        assert_eq!(args.connections().unwrap(), 100);
        assert!(!args.drop_tables);
    }

    #[test]
    fn size_overrides_rows() {
        let args = parse(&["--rows", "10", "--size", "2gb"]);
        assert_eq!(args.total_rows().unwrap(), 2_000_000);
    }

    #[test]
    fn bad_size_is_a_config_error() {
        let args = parse(&["--size", "12kb"]);
        assert!(matches!(args.load_spec(), Err(LoadError::Config(_))));
    }

    #[test]
    fn enums_parse_from_kebab_case() {
        let args = parse(&[
            "--partitioning",
            "per-table",
            "--table-indexing",
            "zero-based",
            "--encoding",
            "literal",
            "--on-error",
            "continue",
        ]);
        assert_eq!(args.partitioning, Partitioning::PerTable);
        assert_eq!(args.table_indexing, TableIndexing::ZeroBased);
        assert_eq!(args.encoding, EncodingPolicy::Literal);
        assert_eq!(args.on_error, FailurePolicy::Continue);
    }

    #[test]
    fn oversized_bound_batch_is_rejected() {
        let args = parse(&["--batch", "20000", "--rows", "100000"]);
        assert!(args.worker_options().is_err());
        let args = parse(&["--batch", "20000", "--rows", "100000", "--encoding", "literal"]);
        assert!(args.worker_options().is_ok());
    }

    #[test]
    fn zero_connections_rejected() {
        assert!(parse(&["--connections", "0"]).connections().is_err());
        assert_eq!(parse(&["--connections", "8"]).connections().unwrap(), 8);
    }
}
