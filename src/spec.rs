use crate::error::{LoadError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the planner spreads rows over tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partitioning {
    /// Full batches dealt to tables in rotation, remainder on the next table.
    #[default]
    RoundRobin,
    /// Even split per table first, then each table's share cut into batches.
    PerTable,
}

/// Numbering of physical table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableIndexing {
    #[default]
    OneBased,
    ZeroBased,
}

impl TableIndexing {
    fn first(self) -> usize {
        match self {
            TableIndexing::OneBased => 1,
            TableIndexing::ZeroBased => 0,
        }
    }
}

/// A fully qualified table, rendered as `` `database`.`name` ``.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub database: String,
    pub name: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`.`{}`", self.database, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSpec {
    pub total_rows: u64,
    pub batch_size: usize,
    pub tables: usize,
    pub workers: usize,
    pub database: String,
    pub table_base_name: String,
    pub partitioning: Partitioning,
    pub indexing: TableIndexing,
}

impl LoadSpec {
    /// Table for a job's 1-based `table_index`.
    pub fn table(&self, table_index: usize) -> TableRef {
        let suffix = table_index - 1 + self.indexing.first();
        TableRef {
            database: self.database.clone(),
            name: format!("{}{}", self.table_base_name, suffix),
        }
    }

    pub fn table_refs(&self) -> impl Iterator<Item = TableRef> + '_ {
        (1..=self.tables).map(|i| self.table(i))
    }
}

pub struct LoadSpecBuilder {
    table_base_name: String,
    database: Option<String>,
    total_rows: Option<u64>,
    batch_size: Option<usize>,
    tables: Option<usize>,
    workers: Option<usize>,
    partitioning: Partitioning,
    indexing: TableIndexing,
}

impl LoadSpecBuilder {
    pub const DEFAULT_DATABASE: &'static str = "brim";
    pub const DEFAULT_TOTAL_ROWS: u64 = 1_000_000;
    pub const DEFAULT_BATCH_SIZE: usize = 1000;
    pub const DEFAULT_TABLES: usize = 1;
    pub const DEFAULT_WORKERS: usize = 100;

    pub fn new(table_base_name: impl Into<String>) -> Self {
        Self {
            table_base_name: table_base_name.into(),
            database: None,
            total_rows: None,
            batch_size: None,
            tables: None,
            workers: None,
            partitioning: Partitioning::default(),
            indexing: TableIndexing::default(),
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn total_rows(mut self, total_rows: u64) -> Self {
        self.total_rows = Some(total_rows);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn tables(mut self, tables: usize) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    pub fn indexing(mut self, indexing: TableIndexing) -> Self {
        self.indexing = indexing;
        self
    }

    pub fn build(self) -> Result<LoadSpec> {
        let spec = LoadSpec {
            total_rows: self.total_rows.unwrap_or(Self::DEFAULT_TOTAL_ROWS),
            batch_size: self.batch_size.unwrap_or(Self::DEFAULT_BATCH_SIZE),
            tables: self.tables.unwrap_or(Self::DEFAULT_TABLES),
            workers: self.workers.unwrap_or(Self::DEFAULT_WORKERS),
            database: self
                .database
                .unwrap_or_else(|| Self::DEFAULT_DATABASE.to_string()),
            table_base_name: self.table_base_name,
            partitioning: self.partitioning,
            indexing: self.indexing,
        };

        if spec.batch_size == 0 {
            return Err(LoadError::config("batch size must be at least 1"));
        }
        if spec.tables == 0 {
            return Err(LoadError::config("table count must be at least 1"));
        }
        if spec.workers == 0 {
            return Err(LoadError::config("worker count must be at least 1"));
        }
        check_identifier("database", &spec.database)?;
        check_identifier("table prefix", &spec.table_base_name)?;

        if spec.partitioning == Partitioning::RoundRobin
            && spec.total_rows > 0
            && spec.batch_size as u64 > spec.total_rows
        {
            return Err(LoadError::config(format!(
                "batch size, {} cannot be larger than the total rows {}",
                spec.batch_size, spec.total_rows
            )));
        }

        Ok(spec)
    }
}

// Names are spliced into DDL and DML text, so only plain identifiers pass.
fn check_identifier(what: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 48 {
        return Err(LoadError::config(format!(
            "{what} must be between 1 and 48 characters"
        )));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(LoadError::config(format!(
            "{what} {name:?} may only contain letters, digits and underscores"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let spec = LoadSpecBuilder::new("brim").build().unwrap();
        assert_eq!(spec.total_rows, 1_000_000);
        assert_eq!(spec.batch_size, 1000);
        assert_eq!(spec.tables, 1);
        assert_eq!(spec.workers, 100);
        assert_eq!(spec.database, "brim");
        assert_eq!(spec.partitioning, Partitioning::RoundRobin);
    }

    #[test]
    fn batch_larger_than_rows_is_rejected_for_round_robin() {
        let err = LoadSpecBuilder::new("brim")
            .total_rows(864)
            .batch_size(1000)
            .build()
            .unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
    }

    #[test]
    fn batch_larger_than_rows_is_allowed_per_table() {
        let spec = LoadSpecBuilder::new("brim")
            .total_rows(864)
            .batch_size(1000)
            .tables(4)
            .partitioning(Partitioning::PerTable)
            .build()
            .unwrap();
        assert_eq!(spec.batch_size, 1000);
    }

    #[test]
    fn zero_rows_is_a_valid_no_op() {
        let spec = LoadSpecBuilder::new("brim")
            .total_rows(0)
            .build()
            .unwrap();
        assert_eq!(spec.total_rows, 0);
    }

    #[test]
    fn zero_counts_are_rejected() {
        assert!(LoadSpecBuilder::new("brim").batch_size(0).build().is_err());
        assert!(LoadSpecBuilder::new("brim").tables(0).build().is_err());
        assert!(LoadSpecBuilder::new("brim").workers(0).build().is_err());
    }

    #[test]
    fn identifiers_are_checked() {
        assert!(LoadSpecBuilder::new("brim; DROP").build().is_err());
        assert!(LoadSpecBuilder::new("").build().is_err());
        assert!(LoadSpecBuilder::new("brim")
            .database("bad`name")
            .build()
            .is_err());
    }

    #[test]
    fn table_names_follow_indexing() {
        let one = LoadSpecBuilder::new("brim").tables(3).build().unwrap();
        let names: Vec<_> = one.table_refs().map(|t| t.name).collect();
        assert_eq!(names, ["brim1", "brim2", "brim3"]);

        let zero = LoadSpecBuilder::new("brim")
            .tables(3)
            .indexing(TableIndexing::ZeroBased)
            .build()
            .unwrap();
        let names: Vec<_> = zero.table_refs().map(|t| t.name).collect();
        assert_eq!(names, ["brim0", "brim1", "brim2"]);
        assert_eq!(zero.table(1).to_string(), "`brim`.`brim0`");
    }
}
