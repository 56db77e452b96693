//! Synthetic bulk-load generator for MySQL and MariaDB.
//!
//! A run is planned once ([`planner::plan`]) into a queue of per-table batch
//! jobs, which a [`pool::WorkerPool`] executes concurrently through a
//! [`gateway::DatabaseGateway`]. Results are aggregated into a
//! [`aggregate::LoadResult`], optionally cross-checked by counting rows.

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod planner;
pub mod pool;
pub mod report;
pub mod row;
pub mod schema;
pub mod size;
pub mod spec;

pub use aggregate::{LoadResult, Verification, VerificationWarning};
pub use cancel::CancelToken;
pub use error::{GatewayError, LoadError, Result};
pub use gateway::{DatabaseGateway, MemoryGateway, MySqlGateway};
pub use loader::Loader;
pub use planner::{plan, Job, JobQueue};
pub use pool::{FailurePolicy, WorkerOptions, WorkerPool};
pub use spec::{LoadSpec, LoadSpecBuilder, Partitioning, TableIndexing};
