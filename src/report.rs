//! JSON run reports, one file per run.

use crate::aggregate::{LoadResult, Verification};
use crate::spec::LoadSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub rows_requested: u64,
    pub rows_inserted: u64,
    pub tables: usize,
    pub batch_size: usize,
    pub workers: usize,
    pub jobs: usize,
    pub elapsed_seconds: f64,
    pub throughput_rows_per_second: f64,
    pub failures: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

impl RunReport {
    pub fn new(spec: &LoadSpec, result: &LoadResult) -> Self {
        Self {
            rows_requested: spec.total_rows,
            rows_inserted: result.rows_inserted,
            tables: spec.tables,
            batch_size: spec.batch_size,
            workers: spec.workers,
            jobs: result.jobs_total,
            elapsed_seconds: result.elapsed.as_secs_f64(),
            throughput_rows_per_second: result.rows_per_second(),
            failures: result.failures.len(),
            verification: result.verification.clone(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("Failed to parse report {}", path.display()))
    }
}
