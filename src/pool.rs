//! Concurrent execution of a [`JobQueue`].
//!
//! The queue is loaded into a closed channel before any worker starts, so
//! claiming never waits on a producer and every job is received by exactly
//! one worker. Each worker owns its [`RowGenerator`] and [`BatchEncoder`];
//! the only shared state is the job receiver and the gateway.
//!
//! Worker lifecycle: claim a job, generate and encode its rows, execute the
//! statement, report a [`Completion`], repeat until the queue is drained or
//! the run is cancelled.

use crate::aggregate::{Completion, LoadResult, ResultAggregator};
use crate::cancel::CancelToken;
use crate::encoder::{BatchEncoder, EncodingPolicy};
use crate::error::{LoadError, Result};
use crate::gateway::DatabaseGateway;
use crate::planner::{Job, JobQueue};
use crate::row::{RowGenerator, DEFAULT_STRING_LENGTH};
use crate::spec::{LoadSpec, TableRef};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What a worker does when an insert fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// First failure stops the run and cancels in-flight work.
    #[default]
    Abort,
    /// Record the failed job and keep going.
    Continue,
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub encoding: EncodingPolicy,
    pub failure_policy: FailurePolicy,
    /// Base seed for reproducible row data; `None` uses OS entropy.
    pub seed: Option<u64>,
    pub string_length: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            encoding: EncodingPolicy::default(),
            failure_policy: FailurePolicy::default(),
            seed: None,
            string_length: DEFAULT_STRING_LENGTH,
        }
    }
}

type JobSource = Arc<Mutex<mpsc::Receiver<Job>>>;

pub struct WorkerPool {
    workers: usize,
    tables: Arc<[TableRef]>,
    options: WorkerOptions,
}

impl WorkerPool {
    pub fn new(spec: &LoadSpec, options: WorkerOptions) -> Self {
        Self {
            workers: spec.workers.max(1),
            tables: spec.table_refs().collect(),
            options,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every job in `jobs` against `gateway`.
    ///
    /// Under [`FailurePolicy::Abort`] the first insert error is returned and
    /// the remaining workers are aborted. Cancelling `cancel` stops all
    /// workers, including ones waiting on the database, and yields
    /// [`LoadError::Cancelled`].
    pub async fn run<G>(
        &self,
        jobs: JobQueue,
        gateway: Arc<G>,
        cancel: &CancelToken,
    ) -> Result<LoadResult>
    where
        G: DatabaseGateway + ?Sized + 'static,
    {
        let total = jobs.len();
        let mut aggregator = ResultAggregator::new(total);
        if total == 0 {
            return Ok(aggregator.finish());
        }

        if let Some(job) = jobs
            .iter()
            .find(|job| job.table_index == 0 || job.table_index > self.tables.len())
        {
            return Err(LoadError::config(format!(
                "job {} targets table {} but the pool was built for {} table(s)",
                job.sequence,
                job.table_index,
                self.tables.len()
            )));
        }

        let workers = self.workers.min(total);
        let connections = gateway.connection_limit() as usize;
        if workers > connections {
            warn!(
                workers,
                connections, "more workers than connections, excess workers will queue for a connection"
            );
        }

        let (job_tx, job_rx) = mpsc::channel(total);
        for job in jobs {
            job_tx
                .send(job)
                .await
                .map_err(|_| LoadError::Cancelled { completed: 0, total })?;
        }
        drop(job_tx);
        let source: JobSource = Arc::new(Mutex::new(job_rx));

        // Tripped by the first failing worker under FailurePolicy::Abort.
        let halt = CancelToken::new();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        for id in 0..workers {
            tasks.spawn(work(
                id,
                Arc::clone(&source),
                Arc::clone(&self.tables),
                Arc::clone(&gateway),
                self.options.clone(),
                done_tx.clone(),
                cancel.clone(),
                halt.clone(),
            ));
        }
        drop(done_tx);
        info!(jobs = total, workers, "workers started");

        loop {
            tokio::select! {
                Some(completion) = done_rx.recv() => aggregator.record(completion),
                Some(joined) = tasks.join_next() => {
                    let failure = match joined {
                        Ok(Ok(())) => None,
                        Ok(Err(err)) => Some(err),
                        Err(err) => Some(LoadError::WorkerPanicked(err.to_string())),
                    };
                    if let Some(err) = failure {
                        error!("{err}, aborting remaining workers");
                        tasks.abort_all();
                        while tasks.join_next().await.is_some() {}
                        return Err(err);
                    }
                }
                else => break,
            }
        }

        if !aggregator.is_finished() {
            return Err(LoadError::Cancelled {
                completed: aggregator.jobs_completed(),
                total,
            });
        }
        Ok(aggregator.finish())
    }
}

async fn claim(source: &JobSource) -> Option<Job> {
    source.lock().await.recv().await
}

async fn work<G>(
    id: usize,
    source: JobSource,
    tables: Arc<[TableRef]>,
    gateway: Arc<G>,
    options: WorkerOptions,
    done: mpsc::UnboundedSender<Completion>,
    cancel: CancelToken,
    halt: CancelToken,
) -> Result<()>
where
    G: DatabaseGateway + ?Sized,
{
    let mut rows = RowGenerator::for_worker(options.seed, id, options.string_length);
    let mut encoder = BatchEncoder::new(options.encoding);
    debug!(worker = id, "worker idle");

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = halt.cancelled() => break,
            job = claim(&source) => match job {
                Some(job) => job,
                None => break,
            },
        };

        // Table indexes were checked against `tables` before any worker started.
        let table = &tables[job.table_index - 1];
        let statement = encoder.encode(table, rows.rows(job.row_count));
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = halt.cancelled() => break,
            outcome = gateway.execute(&statement) => outcome,
        };

        let completion = match outcome {
            Ok(rows_affected) => Completion::Done { job, rows_affected },
            Err(err) => match options.failure_policy {
                FailurePolicy::Abort => {
                    halt.cancel();
                    return Err(LoadError::Insert {
                        sequence: job.sequence,
                        table: table.to_string(),
                        rows: job.row_count,
                        source: err,
                    })
                }
                FailurePolicy::Continue => {
                    warn!(worker = id, sequence = job.sequence, %table, "insert failed: {err}");
                    Completion::Failed {
                        job,
                        table: table.to_string(),
                        error: err.to_string(),
                    }
                }
            },
        };
        if done.send(completion).is_err() {
            break;
        }
    }

    debug!(worker = id, "worker terminated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MemoryGateway, TableDef};
    use crate::planner::plan;
    use crate::spec::LoadSpecBuilder;

    async fn prepared(spec: &LoadSpec, gateway: &MemoryGateway) {
        gateway.create_database(&spec.database).await.unwrap();
        for table in spec.table_refs() {
            let def = TableDef {
                table,
                engine: "InnoDB".into(),
                string_length: 8,
            };
            gateway.create_table(&def, false).await.unwrap();
        }
    }

    fn options() -> WorkerOptions {
        WorkerOptions {
            seed: Some(64),
            string_length: 8,
            ..WorkerOptions::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_every_job_once() {
        let spec = LoadSpecBuilder::new("brim")
            .total_rows(10_050)
            .batch_size(100)
            .tables(3)
            .workers(8)
            .build()
            .unwrap();
        let gateway = Arc::new(MemoryGateway::new());
        prepared(&spec, &gateway).await;

        let jobs = plan(&spec).unwrap();
        let job_count = jobs.len();
        let result = WorkerPool::new(&spec, options())
            .run(jobs, Arc::clone(&gateway), &CancelToken::new())
            .await
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.jobs_completed, job_count);
        assert_eq!(result.rows_inserted, 10_050);
        assert_eq!(gateway.inserts().await.len(), job_count);
        assert_eq!(gateway.attempts(), job_count);
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let spec = LoadSpecBuilder::new("brim").total_rows(0).build().unwrap();
        let gateway = Arc::new(MemoryGateway::new());
        let result = WorkerPool::new(&spec, options())
            .run(JobQueue::default(), Arc::clone(&gateway), &CancelToken::new())
            .await
            .unwrap();
        assert!(result.is_complete());
        assert_eq!(result.rows_inserted, 0);
        assert_eq!(gateway.attempts(), 0);
    }

    #[tokio::test]
    async fn abort_stops_dispatch_after_first_failure() {
        let spec = LoadSpecBuilder::new("brim")
            .total_rows(1000)
            .batch_size(100)
            .tables(2)
            .workers(1)
            .build()
            .unwrap();
        let gateway = Arc::new(MemoryGateway::new().fail_on_attempt(3));
        prepared(&spec, &gateway).await;

        let err = WorkerPool::new(&spec, options())
            .run(plan(&spec).unwrap(), Arc::clone(&gateway), &CancelToken::new())
            .await
            .unwrap_err();

        match err {
            LoadError::Insert { sequence, rows, .. } => {
                assert_eq!(sequence, 2);
                assert_eq!(rows, 100);
            }
            other => panic!("expected insert error, got {other}"),
        }
        assert_eq!(gateway.attempts(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn abort_halts_sibling_workers() {
        let spec = LoadSpecBuilder::new("brim")
            .total_rows(100_000)
            .batch_size(10)
            .tables(4)
            .workers(32)
            .build()
            .unwrap();
        for _ in 0..5 {
            let gateway = Arc::new(MemoryGateway::new().fail_on_attempt(1));
            prepared(&spec, &gateway).await;

            let err = WorkerPool::new(&spec, options())
                .run(plan(&spec).unwrap(), Arc::clone(&gateway), &CancelToken::new())
                .await
                .unwrap_err();

            assert!(matches!(err, LoadError::Insert { .. }), "{err}");
            assert!(gateway.attempts() <= 32, "attempts {}", gateway.attempts());
        }
    }

    #[tokio::test]
    async fn jobs_for_unknown_tables_are_rejected() {
        let small = LoadSpecBuilder::new("brim")
            .total_rows(100)
            .batch_size(10)
            .tables(1)
            .build()
            .unwrap();
        let large = LoadSpecBuilder::new("brim")
            .total_rows(100)
            .batch_size(10)
            .tables(3)
            .build()
            .unwrap();
        let gateway = Arc::new(MemoryGateway::new());
        prepared(&large, &gateway).await;

        let err = WorkerPool::new(&small, options())
            .run(plan(&large).unwrap(), Arc::clone(&gateway), &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Config(_)), "{err}");
        assert_eq!(gateway.attempts(), 0);
    }

    #[tokio::test]
    async fn continue_records_failures() {
        let spec = LoadSpecBuilder::new("brim")
            .total_rows(1000)
            .batch_size(100)
            .tables(2)
            .workers(2)
            .build()
            .unwrap();
        let gateway = Arc::new(MemoryGateway::new().fail_on_attempt(4));
        prepared(&spec, &gateway).await;

        let result = WorkerPool::new(
            &spec,
            WorkerOptions {
                failure_policy: FailurePolicy::Continue,
                ..options()
            },
        )
        .run(plan(&spec).unwrap(), Arc::clone(&gateway), &CancelToken::new())
        .await
        .unwrap();

        assert!(!result.is_complete());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.jobs_completed, 9);
        assert_eq!(result.rows_inserted, 900);
        assert_eq!(gateway.attempts(), 10);
    }
}
