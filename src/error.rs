use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadError>;

/// Failures surfaced by a [`DatabaseGateway`](crate::gateway::DatabaseGateway).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error("statement rejected: {0}")]
    Rejected(String),

    #[error("injected failure: {0}")]
    Injected(String),
}

/// Everything that can stop a load run.
///
/// Every variant is fatal. Row-count mismatches found after a run are not
/// errors; see [`VerificationWarning`](crate::aggregate::VerificationWarning).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to connect to database: {0}")]
    Connection(#[source] GatewayError),

    #[error("failed to create {object}: {source}")]
    Schema {
        object: String,
        #[source]
        source: GatewayError,
    },

    #[error("job {sequence} failed inserting {rows} rows into {table}: {source}")]
    Insert {
        sequence: usize,
        table: String,
        rows: usize,
        #[source]
        source: GatewayError,
    },

    #[error("load cancelled after {completed} of {total} jobs")]
    Cancelled { completed: usize, total: usize },

    #[error("worker task panicked: {0}")]
    WorkerPanicked(String),
}

impl LoadError {
    pub fn config(msg: impl Into<String>) -> Self {
        LoadError::Config(msg.into())
    }

    /// Short machine-friendly name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Config(_) => "config",
            LoadError::Connection(_) => "connection",
            LoadError::Schema { .. } => "schema",
            LoadError::Insert { .. } => "insert",
            LoadError::Cancelled { .. } => "cancelled",
            LoadError::WorkerPanicked(_) => "worker_panicked",
        }
    }
}
