//! Partitioning of a row total into per-table insert jobs.
//!
//! Planning is pure: the same [`LoadSpec`] always yields the same queue, and
//! the sum of all job row counts is exactly `total_rows`.

use crate::error::{LoadError, Result};
use crate::spec::{LoadSpec, Partitioning};

/// One batch insert: `row_count` rows into the table at `table_index` (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    /// Position in the queue, used as the job's identity.
    pub sequence: usize,
    pub table_index: usize,
    pub row_count: usize,
}

/// Ordered, immutable list of jobs produced by [`plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQueue {
    jobs: Vec<Job>,
}

impl JobQueue {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Job> {
        self.jobs.iter()
    }

    pub fn total_rows(&self) -> u64 {
        self.jobs.iter().map(|j| j.row_count as u64).sum()
    }

    /// Planned rows per table, indexed by `table_index - 1`.
    pub fn rows_per_table(&self, tables: usize) -> Vec<u64> {
        let mut per_table = vec![0u64; tables];
        for job in &self.jobs {
            per_table[job.table_index - 1] += job.row_count as u64;
        }
        per_table
    }

    fn push(&mut self, table_index: usize, row_count: usize) {
        let sequence = self.jobs.len();
        self.jobs.push(Job {
            sequence,
            table_index,
            row_count,
        });
    }
}

impl IntoIterator for JobQueue {
    type Item = Job;
    type IntoIter = std::vec::IntoIter<Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

impl<'a> IntoIterator for &'a JobQueue {
    type Item = &'a Job;
    type IntoIter = std::slice::Iter<'a, Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}

pub fn plan(spec: &LoadSpec) -> Result<JobQueue> {
    match spec.partitioning {
        Partitioning::RoundRobin => plan_round_robin(spec.total_rows, spec.batch_size, spec.tables),
        Partitioning::PerTable => plan_per_table(spec.total_rows, spec.batch_size, spec.tables),
    }
}

/// Deals full batches to tables `1..=tables` in rotation until fewer than
/// `batch_size` rows remain, then gives the remainder to the next table.
pub fn plan_round_robin(total_rows: u64, batch_size: usize, tables: usize) -> Result<JobQueue> {
    check_counts(batch_size, tables)?;
    if total_rows > 0 && batch_size as u64 > total_rows {
        return Err(LoadError::config(format!(
            "batch size, {batch_size} cannot be larger than the total rows {total_rows}"
        )));
    }

    let mut queue = JobQueue::default();
    let batch = batch_size as u64;
    let mut remaining = total_rows;
    let mut table = 1;

    while remaining >= batch {
        queue.push(table, batch_size);
        remaining -= batch;
        table = if table >= tables { 1 } else { table + 1 };
    }
    if remaining > 0 {
        queue.push(table, remaining as usize);
    }

    Ok(queue)
}

/// Splits `total_rows` evenly across tables (the first `total_rows % tables`
/// get one extra row), cuts each share into batches of at most `batch_size`,
/// and interleaves the batches table by table.
pub fn plan_per_table(total_rows: u64, batch_size: usize, tables: usize) -> Result<JobQueue> {
    check_counts(batch_size, tables)?;

    let base = total_rows / tables as u64;
    let extra = total_rows % tables as u64;
    let mut left: Vec<u64> = (0..tables as u64)
        .map(|i| base + u64::from(i < extra))
        .collect();

    let mut queue = JobQueue::default();
    let batch = batch_size as u64;
    let mut pending = total_rows;

    while pending > 0 {
        for (i, quota) in left.iter_mut().enumerate() {
            if *quota == 0 {
                continue;
            }
            let take = (*quota).min(batch);
            queue.push(i + 1, take as usize);
            *quota -= take;
            pending -= take;
        }
    }

    Ok(queue)
}

fn check_counts(batch_size: usize, tables: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(LoadError::config("batch size must be at least 1"));
    }
    if tables == 0 {
        return Err(LoadError::config("table count must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::LoadSpecBuilder;

    fn shape(queue: &JobQueue) -> Vec<(usize, usize)> {
        queue.iter().map(|j| (j.table_index, j.row_count)).collect()
    }

    fn assert_postconditions(queue: &JobQueue, total: u64, batch: usize, tables: usize) {
        assert_eq!(queue.total_rows(), total);
        for (i, job) in queue.iter().enumerate() {
            assert_eq!(job.sequence, i);
            assert!(job.row_count >= 1 && job.row_count <= batch, "{job:?}");
            assert!((1..=tables).contains(&job.table_index), "{job:?}");
        }
    }

    #[test]
    fn round_robin_with_remainder() {
        let queue = plan_round_robin(2500, 1000, 2).unwrap();
        assert_eq!(shape(&queue), [(1, 1000), (2, 1000), (1, 500)]);
    }

    #[test]
    fn round_robin_exact_multiple_has_no_empty_tail() {
        let queue = plan_round_robin(3000, 1000, 4).unwrap();
        assert_eq!(shape(&queue), [(1, 1000), (2, 1000), (3, 1000)]);
    }

    #[test]
    fn round_robin_wraps_tables() {
        let queue = plan_round_robin(10, 2, 3).unwrap();
        assert_eq!(
            shape(&queue),
            [(1, 2), (2, 2), (3, 2), (1, 2), (2, 2)]
        );
    }

    #[test]
    fn round_robin_rejects_batch_above_total() {
        let err = plan_round_robin(864, 1000, 4).unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
    }

    #[test]
    fn zero_rows_plans_nothing() {
        assert!(plan_round_robin(0, 1000, 4).unwrap().is_empty());
        assert!(plan_per_table(0, 1000, 4).unwrap().is_empty());
    }

    #[test]
    fn per_table_splits_evenly() {
        let queue = plan_per_table(864, 1000, 4).unwrap();
        assert_eq!(shape(&queue), [(1, 216), (2, 216), (3, 216), (4, 216)]);
    }

    #[test]
    fn per_table_spreads_remainder_and_interleaves() {
        let queue = plan_per_table(10, 2, 3).unwrap();
        // quotas 4, 3, 3
        assert_eq!(
            shape(&queue),
            [(1, 2), (2, 2), (3, 2), (1, 2), (2, 1), (3, 1)]
        );
        assert_eq!(queue.rows_per_table(3), [4, 3, 3]);
    }

    #[test]
    fn per_table_skips_tables_without_rows() {
        let queue = plan_per_table(2, 10, 5).unwrap();
        assert_eq!(shape(&queue), [(1, 1), (2, 1)]);
    }

    #[test]
    fn plan_dispatches_on_partitioning() {
        let spec = LoadSpecBuilder::new("brim")
            .total_rows(864)
            .batch_size(1000)
            .tables(4)
            .partitioning(Partitioning::PerTable)
            .build()
            .unwrap();
        assert_eq!(plan(&spec).unwrap().len(), 4);
    }

    #[test]
    fn plans_are_deterministic() {
        assert_eq!(
            plan_round_robin(123_457, 1000, 7).unwrap(),
            plan_round_robin(123_457, 1000, 7).unwrap()
        );
    }

    #[test]
    fn postconditions_hold_across_grid() {
        for total in [0u64, 1, 2, 7, 99, 100, 101, 1000, 4321] {
            for batch in [1usize, 2, 3, 10, 64, 1000] {
                for tables in [1usize, 2, 3, 8] {
                    let per_table = plan_per_table(total, batch, tables).unwrap();
                    assert_postconditions(&per_table, total, batch, tables);

                    if total == 0 || batch as u64 <= total {
                        let rr = plan_round_robin(total, batch, tables).unwrap();
                        assert_postconditions(&rr, total, batch, tables);
                    }
                }
            }
        }
    }
}
