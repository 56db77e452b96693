use crate::error::{LoadError, Result};
use crate::gateway::{DatabaseGateway, TableDef};
use crate::spec::LoadSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOptions {
    pub engine: String,
    pub string_length: usize,
    /// Drop each table before creating it.
    pub reset: bool,
}

impl SchemaOptions {
    pub fn new(engine: impl Into<String>, string_length: usize, reset: bool) -> Result<Self> {
        let engine = engine.into();
        if engine.is_empty() || !engine.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(LoadError::config(format!("invalid storage engine {engine:?}")));
        }
        if !(1..=255).contains(&string_length) {
            return Err(LoadError::config(format!(
                "string length {string_length} must be between 1 and 255"
            )));
        }
        Ok(Self {
            engine,
            string_length,
            reset,
        })
    }
}

/// Creates the database and then every table in order, stopping at the
/// first failure.
pub async fn prepare<G>(gateway: &G, spec: &LoadSpec, options: &SchemaOptions) -> Result<()>
where
    G: DatabaseGateway + ?Sized,
{
    gateway
        .create_database(&spec.database)
        .await
        .map_err(|source| LoadError::Schema {
            object: format!("database `{}`", spec.database),
            source,
        })?;

    for table in spec.table_refs() {
        let def = TableDef {
            table,
            engine: options.engine.clone(),
            string_length: options.string_length,
        };
        gateway
            .create_table(&def, options.reset)
            .await
            .map_err(|source| LoadError::Schema {
                object: format!("table {}", def.table),
                source,
            })?;
    }

    Ok(())
}
