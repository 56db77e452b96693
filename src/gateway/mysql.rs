use super::{DatabaseGateway, TableDef};
use crate::encoder::Statement;
use crate::error::GatewayError;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Executor;
use tracing::{debug, info};

/// [`DatabaseGateway`] over a sqlx MySQL/MariaDB connection pool.
pub struct MySqlGateway {
    pool: MySqlPool,
    max_connections: u32,
}

impl MySqlGateway {
    /// Opens the pool. Statements are always fully qualified, so the options
    /// should not select a database that might not exist yet.
    pub async fn connect(
        options: MySqlConnectOptions,
        max_connections: u32,
    ) -> Result<Self, GatewayError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            max_connections,
        })
    }

    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self, GatewayError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self {
            pool,
            max_connections,
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub fn create_table_sql(def: &TableDef) -> String {
    let len = def.string_length;
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
a bigint(20) NOT NULL AUTO_INCREMENT,
b int(11) NOT NULL,
c char({len}) NOT NULL,
d char({len}) NOT NULL,
e char({len}) NOT NULL,
f char({len}) NOT NULL,
PRIMARY KEY (a),
INDEX (b)) ENGINE={engine}",
        table = def.table,
        engine = def.engine,
    )
}

#[async_trait]
impl DatabaseGateway for MySqlGateway {
    async fn create_database(&self, name: &str) -> Result<(), GatewayError> {
        info!("Creating database {name}");
        self.pool
            .execute(format!("CREATE DATABASE IF NOT EXISTS `{name}`").as_str())
            .await?;
        Ok(())
    }

    async fn create_table(&self, def: &TableDef, reset: bool) -> Result<(), GatewayError> {
        if reset {
            info!("Dropping table {}", def.table);
            self.pool
                .execute(format!("DROP TABLE IF EXISTS {}", def.table).as_str())
                .await?;
        }
        info!("Creating table {}", def.table);
        self.pool.execute(create_table_sql(def).as_str()).await?;
        Ok(())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, GatewayError> {
        let done = if statement.is_bound() {
            let mut query = sqlx::query(&statement.sql);
            for row in &statement.params {
                let [c, d, e, f] = &row.fields;
                query = query
                    .bind(row.id)
                    .bind(c.as_str())
                    .bind(d.as_str())
                    .bind(e.as_str())
                    .bind(f.as_str());
            }
            query.execute(&self.pool).await?
        } else {
            // Literal text is unique per batch; keep it out of the statement cache.
            self.pool.execute(statement.sql.as_str()).await?
        };

        debug!(rows = done.rows_affected(), "statement executed");
        Ok(done.rows_affected())
    }

    async fn query_scalar(&self, sql: &str) -> Result<i64, GatewayError> {
        let value: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(value)
    }

    fn connection_limit(&self) -> u32 {
        self.max_connections
    }
}
