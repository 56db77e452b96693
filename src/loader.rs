use crate::aggregate::{count_tables, verify, LoadResult};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::gateway::DatabaseGateway;
use crate::planner::plan;
use crate::pool::{WorkerOptions, WorkerPool};
use crate::schema::{prepare, SchemaOptions};
use crate::spec::LoadSpec;
use std::sync::Arc;
use tracing::{info, warn};

/// One complete load: schema, plan, concurrent inserts, optional verification.
pub struct Loader {
    spec: LoadSpec,
    schema: SchemaOptions,
    workers: WorkerOptions,
    verify: bool,
}

impl Loader {
    pub fn new(spec: LoadSpec, schema: SchemaOptions, workers: WorkerOptions) -> Self {
        Self {
            spec,
            schema,
            workers,
            verify: true,
        }
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn spec(&self) -> &LoadSpec {
        &self.spec
    }

    pub async fn run<G>(&self, gateway: Arc<G>, cancel: &CancelToken) -> Result<LoadResult>
    where
        G: DatabaseGateway + ?Sized + 'static,
    {
        // Planning first: a bad configuration must fail before any DDL runs.
        let jobs = plan(&self.spec)?;

        prepare(gateway.as_ref(), &self.spec, &self.schema).await?;

        // Tables may already hold rows when they are not reset.
        let baseline = if self.verify {
            match count_tables(gateway.as_ref(), &self.spec).await {
                Ok(counts) => Some(counts),
                Err(err) => {
                    warn!("row count baseline failed, skipping verification: {err}");
                    None
                }
            }
        } else {
            None
        };

        info!(
            "Loading {} rows, into {} table(s), batch size of {}, over {} jobs and {} workers",
            self.spec.total_rows,
            self.spec.tables,
            self.spec.batch_size,
            jobs.len(),
            self.spec.workers
        );

        let pool = WorkerPool::new(&self.spec, self.workers.clone());
        let mut result = pool.run(jobs, Arc::clone(&gateway), cancel).await?;

        info!(
            rows = result.rows_inserted,
            elapsed_secs = result.elapsed.as_secs_f64(),
            "load finished"
        );

        if let Some(baseline) = baseline {
            match verify(gateway.as_ref(), &self.spec, &baseline, self.spec.total_rows).await {
                Ok(verification) => result.verification = Some(verification),
                Err(err) => warn!("row count verification failed: {err}"),
            }
        }

        Ok(result)
    }
}
