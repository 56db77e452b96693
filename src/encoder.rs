//! Turns generated rows into insert statements.

use crate::error::{LoadError, Result};
use crate::row::Row;
use crate::spec::TableRef;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const INSERT_COLUMNS: &str = "(b,c,d,e,f)";
pub const COLUMNS_PER_ROW: usize = 5;

/// Placeholder limit of a single MySQL prepared statement.
pub const MAX_PLACEHOLDERS: usize = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingPolicy {
    /// `VALUES (?,?,?,?,?),...` with rows bound as parameters.
    #[default]
    Bound,
    /// Values embedded in the statement text.
    Literal,
}

impl EncodingPolicy {
    /// Rejects batch sizes the policy cannot express in one statement.
    pub fn check_batch_size(self, batch_size: usize) -> Result<()> {
        if self != EncodingPolicy::Bound {
            return Ok(());
        }
        let placeholders = batch_size.checked_mul(COLUMNS_PER_ROW);
        if placeholders.map_or(true, |n| n > MAX_PLACEHOLDERS) {
            return Err(LoadError::config(format!(
                "batch size {batch_size} exceeds {MAX_PLACEHOLDERS} placeholders, bound encoding allows at most {} rows per batch",
                MAX_PLACEHOLDERS / COLUMNS_PER_ROW
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Ddl,
    Insert { table: TableRef, rows: usize },
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    /// Rows bound in order, `COLUMNS_PER_ROW` placeholders each. Empty for literal SQL.
    pub params: Vec<Row>,
    pub kind: StatementKind,
}

impl Statement {
    pub fn ddl(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            kind: StatementKind::Ddl,
        }
    }

    pub fn is_bound(&self) -> bool {
        !self.params.is_empty()
    }
}

/// Per-worker encoder. Bound statement text is cached per table and batch
/// length so repeated batches reuse the same prepared statement.
pub struct BatchEncoder {
    policy: EncodingPolicy,
    bound_sql: HashMap<(TableRef, usize), String>,
}

impl BatchEncoder {
    pub fn new(policy: EncodingPolicy) -> Self {
        Self {
            policy,
            bound_sql: HashMap::new(),
        }
    }

    pub fn policy(&self) -> EncodingPolicy {
        self.policy
    }

    pub fn encode(&mut self, table: &TableRef, rows: Vec<Row>) -> Statement {
        let kind = StatementKind::Insert {
            table: table.clone(),
            rows: rows.len(),
        };
        match self.policy {
            EncodingPolicy::Literal => Statement {
                sql: literal_insert(table, &rows),
                params: Vec::new(),
                kind,
            },
            EncodingPolicy::Bound => {
                let sql = self
                    .bound_sql
                    .entry((table.clone(), rows.len()))
                    .or_insert_with(|| bound_insert(table, rows.len()))
                    .clone();
                Statement {
                    sql,
                    params: rows,
                    kind,
                }
            }
        }
    }
}

fn insert_prefix(table: &TableRef) -> String {
    format!("INSERT INTO {table} {INSERT_COLUMNS} VALUES ")
}

fn bound_insert(table: &TableRef, rows: usize) -> String {
    let mut sql = insert_prefix(table);
    sql.reserve(rows * 12);
    for i in 0..rows {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str("(?,?,?,?,?)");
    }
    sql
}

// Row strings are alphanumeric, so no quoting or escaping is needed.
fn literal_insert(table: &TableRef, rows: &[Row]) -> String {
    let mut sql = insert_prefix(table);
    let row_len = rows
        .first()
        .map(|r| r.fields.iter().map(|f| f.len() + 3).sum::<usize>() + 14)
        .unwrap_or(0);
    sql.reserve(rows.len() * row_len);

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        let [c, d, e, f] = &row.fields;
        sql.push_str(&format!("({},'{c}','{d}','{e}','{f}')", row.id));
    }
    sql
}
