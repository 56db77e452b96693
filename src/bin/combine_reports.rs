//! Combine run reports into one summary.
//!
//! Reads the JSON reports written by `brimming --report <path>`, groups them
//! by requested row count and writes averaged throughput per group.
//!
//! Usage: combine_reports <output.json> <report.json>...

use anyhow::{bail, Context, Result};
use brimming::report::RunReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct CombinedResult {
    rows_requested: u64,
    num_runs: usize,
    total_rows_inserted: u64,
    mean_elapsed_seconds: f64,
    mean_throughput_rows_per_second: f64,
    verified_runs: usize,
    mismatched_runs: usize,
    failed_jobs: usize,
}

#[derive(Debug, Serialize)]
struct CombinedOutput {
    results: Vec<CombinedResult>,
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!(
            "Usage: {} <output.json> <report.json>...",
            args.first().map(|s| s.as_str()).unwrap_or("combine_reports")
        );
    }

    let output_file = PathBuf::from(&args[1]);
    let mut groups: BTreeMap<u64, Vec<RunReport>> = BTreeMap::new();
    for path in &args[2..] {
        let report = RunReport::read(path.as_ref())?;
        groups.entry(report.rows_requested).or_default().push(report);
    }

    let results = groups
        .into_iter()
        .map(|(rows_requested, runs)| combine(rows_requested, &runs))
        .collect();

    let json = serde_json::to_string_pretty(&CombinedOutput { results })?;
    fs::write(&output_file, json)
        .with_context(|| format!("Failed to write output to {}", output_file.display()))?;

    println!("Results written to {}", output_file.display());

    Ok(())
}

fn combine(rows_requested: u64, runs: &[RunReport]) -> CombinedResult {
    let n = runs.len() as f64;
    let verifications = runs.iter().filter_map(|r| r.verification.as_ref());

    CombinedResult {
        rows_requested,
        num_runs: runs.len(),
        total_rows_inserted: runs.iter().map(|r| r.rows_inserted).sum(),
        mean_elapsed_seconds: runs.iter().map(|r| r.elapsed_seconds).sum::<f64>() / n,
        mean_throughput_rows_per_second: runs
            .iter()
            .map(|r| r.throughput_rows_per_second)
            .sum::<f64>()
            / n,
        verified_runs: verifications.clone().count(),
        mismatched_runs: verifications.filter(|v| v.warning.is_some()).count(),
        failed_jobs: runs.iter().map(|r| r.failures).sum(),
    }
}
