//! Completion accounting and the post-load verification pass.

use crate::error::GatewayError;
use crate::gateway::DatabaseGateway;
use crate::planner::Job;
use crate::spec::LoadSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, warn};

/// Signal a worker emits once per claimed job.
#[derive(Debug)]
pub enum Completion {
    Done { job: Job, rows_affected: u64 },
    Failed { job: Job, table: String, error: String },
}

impl Completion {
    fn job(&self) -> &Job {
        match self {
            Completion::Done { job, .. } | Completion::Failed { job, .. } => job,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub sequence: usize,
    pub table: String,
    pub rows: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    /// Rows present before the workers started.
    pub baseline: u64,
    /// Rows present after the load.
    pub rows: u64,
}

impl TableCount {
    pub fn added(&self) -> u64 {
        self.rows.saturating_sub(self.baseline)
    }
}

/// Rows added during the run differ from what the run inserted. Not fatal:
/// other writers may be touching the same tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationWarning {
    pub expected: u64,
    pub measured: u64,
}

impl fmt::Display for VerificationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} new rows across all tables but counted {}",
            self.expected, self.measured
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub per_table: Vec<TableCount>,
    /// Summed row count before the load.
    pub baseline: u64,
    /// Rows added across all tables since the baseline was taken.
    pub measured: u64,
    pub expected: u64,
    pub warning: Option<VerificationWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub jobs_total: usize,
    pub jobs_completed: usize,
    pub rows_inserted: u64,
    pub elapsed: Duration,
    pub failures: Vec<JobFailure>,
    pub verification: Option<Verification>,
}

impl LoadResult {
    /// Every job finished and none failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.jobs_completed == self.jobs_total
    }

    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.rows_inserted as f64 / secs
        } else {
            0.0
        }
    }
}

/// Single owner of the run's counters; workers only send it [`Completion`]s.
pub struct ResultAggregator {
    started: Instant,
    seen: Vec<bool>,
    jobs_completed: usize,
    rows_inserted: u64,
    failures: Vec<JobFailure>,
    duplicates: usize,
}

impl ResultAggregator {
    pub fn new(total_jobs: usize) -> Self {
        Self {
            started: Instant::now(),
            seen: vec![false; total_jobs],
            jobs_completed: 0,
            rows_inserted: 0,
            failures: Vec::new(),
            duplicates: 0,
        }
    }

    pub fn total_jobs(&self) -> usize {
        self.seen.len()
    }

    pub fn jobs_completed(&self) -> usize {
        self.jobs_completed
    }

    /// Jobs that reported back, failed or not.
    pub fn accounted(&self) -> usize {
        self.jobs_completed + self.failures.len()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn is_finished(&self) -> bool {
        self.accounted() == self.total_jobs()
    }

    pub fn record(&mut self, completion: Completion) {
        let sequence = completion.job().sequence;
        match self.seen.get_mut(sequence) {
            Some(seen) if !*seen => *seen = true,
            _ => {
                error!(sequence, "unexpected or repeated completion signal");
                self.duplicates += 1;
                return;
            }
        }

        match completion {
            Completion::Done { job, rows_affected } => {
                if rows_affected != job.row_count as u64 {
                    warn!(
                        sequence = job.sequence,
                        expected = job.row_count,
                        rows_affected,
                        "insert affected an unexpected number of rows"
                    );
                }
                self.jobs_completed += 1;
                self.rows_inserted += rows_affected;
            }
            Completion::Failed { job, table, error } => self.failures.push(JobFailure {
                sequence: job.sequence,
                table,
                rows: job.row_count,
                error,
            }),
        }
    }

    pub fn finish(mut self) -> LoadResult {
        self.failures.sort_by_key(|f| f.sequence);
        LoadResult {
            jobs_total: self.seen.len(),
            jobs_completed: self.jobs_completed,
            rows_inserted: self.rows_inserted,
            elapsed: self.started.elapsed(),
            failures: self.failures,
            verification: None,
        }
    }
}

/// Current row count of every table in `spec`, in table order.
pub async fn count_tables<G>(gateway: &G, spec: &LoadSpec) -> Result<Vec<u64>, GatewayError>
where
    G: DatabaseGateway + ?Sized,
{
    let mut counts = Vec::with_capacity(spec.tables);
    for table in spec.table_refs() {
        counts.push(gateway.count_rows(&table).await?);
    }
    Ok(counts)
}

/// Counts rows in every table of `spec` and compares the growth over
/// `baseline` (one count per table, from [`count_tables`]) to `expected`.
pub async fn verify<G>(
    gateway: &G,
    spec: &LoadSpec,
    baseline: &[u64],
    expected: u64,
) -> Result<Verification, GatewayError>
where
    G: DatabaseGateway + ?Sized,
{
    let counts = count_tables(gateway, spec).await?;
    let per_table: Vec<TableCount> = spec
        .table_refs()
        .zip(counts)
        .enumerate()
        .map(|(i, (table, rows))| TableCount {
            table: table.to_string(),
            baseline: baseline.get(i).copied().unwrap_or(0),
            rows,
        })
        .collect();

    let before: u64 = per_table.iter().map(|t| t.baseline).sum();
    let after: u64 = per_table.iter().map(|t| t.rows).sum();
    let measured = after.saturating_sub(before);
    let warning = (measured != expected).then_some(VerificationWarning { expected, measured });
    if let Some(warning) = &warning {
        warn!(baseline = before, "verification mismatch: {warning}");
    }

    Ok(Verification {
        per_table,
        baseline: before,
        measured,
        expected,
        warning,
    })
}
