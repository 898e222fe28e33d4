// MySQL client using connection pooling for optimal resource management
use crate::config::DatabaseConfig;
use crate::error::{GatewayError, Result};
use crate::models::{ColumnDescriptor, QueryParam, Record, TableSchema};
use crate::services::database::adapter::DatabaseClient;
use crate::services::database::{quote_mysql_identifier, BackendKind};
use mysql_async::{
    prelude::*, Conn, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Row, Value as MySqlValue,
};
use serde_json::{json, Value};
use std::time::Instant;

const BACKEND: BackendKind = BackendKind::MySql;

pub struct MySqlClient {
    pool: Pool,
}

impl MySqlClient {
    /// Build the pool and check out one connection as a connectivity probe.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let constraints = PoolConstraints::new(
            config.min_pool_size as usize,
            config.max_pool_size as usize,
        )
        .ok_or_else(|| {
            GatewayError::Configuration(format!(
                "invalid MySQL pool bounds {}..={}",
                config.min_pool_size, config.max_pool_size
            ))
        })?;

        let port = config.port.unwrap_or(BACKEND.default_port());
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.name.clone()))
            .pool_opts(PoolOpts::default().with_constraints(constraints));

        tracing::info!(
            "Creating MySQL pool for {}@{}:{}/{} (min: {}, max: {})",
            config.user,
            config.host,
            port,
            config.name,
            config.min_pool_size,
            config.max_pool_size
        );

        let client = Self {
            pool: Pool::new(opts),
        };
        client.ping().await?;
        Ok(client)
    }

    /// Get a connection from the pool; it returns to the pool when dropped
    async fn get_conn(&self) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(GatewayError::driver(BACKEND))
    }

    fn to_mysql_params(params: &[QueryParam]) -> Params {
        let values = params
            .iter()
            .map(|param| match param {
                QueryParam::Null => MySqlValue::NULL,
                QueryParam::Bool(v) => MySqlValue::Int(i64::from(*v)),
                QueryParam::Int(v) => MySqlValue::Int(*v),
                QueryParam::Float(v) => MySqlValue::Double(*v),
                QueryParam::Text(v) => MySqlValue::Bytes(v.clone().into_bytes()),
            })
            .collect();
        Params::Positional(values)
    }

    /// `SHOW TABLES`, optionally scoped with `FROM` so the pooled session's
    /// default database is left untouched.
    fn show_tables_statement(database: Option<&str>) -> String {
        match database {
            Some(name) => format!("SHOW TABLES FROM {}", quote_mysql_identifier(name)),
            None => "SHOW TABLES".to_string(),
        }
    }

    fn row_to_record(row: &Row) -> Record {
        let mut record = Record::new();
        for (idx, column) in row.columns_ref().iter().enumerate() {
            let value = match row.as_ref(idx) {
                Some(mysql_val) => Self::mysql_value_to_json(mysql_val),
                None => Value::Null,
            };
            record.insert(column.name_str().to_string(), value);
        }
        record
    }

    /// Helper function to convert MySQL Value to JSON Value
    fn mysql_value_to_json(mysql_val: &MySqlValue) -> Value {
        match mysql_val {
            MySqlValue::NULL => Value::Null,
            MySqlValue::Bytes(bytes) => {
                // Try to convert to UTF-8 string
                match std::str::from_utf8(bytes) {
                    Ok(s) => json!(s),
                    Err(_) => Value::Null,
                }
            }
            MySqlValue::Int(i) => json!(i),
            MySqlValue::UInt(u) => json!(u),
            MySqlValue::Float(f) => json!(f),
            MySqlValue::Double(d) => json!(d),
            MySqlValue::Date(y, m, d, h, min, s, _) => {
                json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
            }
            MySqlValue::Time(is_neg, d, h, m, s, _) => {
                let sign = if *is_neg { "-" } else { "" };
                let total_hours = d * 24 + u32::from(*h);
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            }
        }
    }
}

#[async_trait::async_trait]
impl DatabaseClient for MySqlClient {
    fn backend(&self) -> BackendKind {
        BACKEND
    }

    async fn execute_query(&self, query: &str, params: &[QueryParam]) -> Result<Vec<Record>> {
        let mut conn = self.get_conn().await?;
        let start_time = Instant::now();

        // Autocommit is on, so statements without a result set are already
        // committed when this returns an empty row list
        let rows: Vec<Row> = if params.is_empty() {
            conn.query::<Row, _>(query).await
        } else {
            conn.exec::<Row, _, _>(query, Self::to_mysql_params(params)).await
        }
        .map_err(GatewayError::driver(BACKEND))?;

        let records: Vec<Record> = rows.iter().map(Self::row_to_record).collect();

        tracing::debug!(
            "MySQL query returned {} rows in {} ms",
            records.len(),
            start_time.elapsed().as_millis()
        );

        Ok(records)
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let mut conn = self.get_conn().await?;
        conn.query("SHOW DATABASES")
            .await
            .map_err(GatewayError::driver(BACKEND))
    }

    async fn list_tables(&self, database: Option<&str>) -> Result<Vec<String>> {
        let mut conn = self.get_conn().await?;
        conn.query(Self::show_tables_statement(database))
            .await
            .map_err(GatewayError::driver(BACKEND))
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableSchema> {
        let query = r#"
            SELECT
                c.COLUMN_NAME,
                c.DATA_TYPE,
                c.IS_NULLABLE,
                c.COLUMN_DEFAULT,
                c.CHARACTER_MAXIMUM_LENGTH
            FROM information_schema.COLUMNS c
            WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = ?
            ORDER BY c.ORDINAL_POSITION
        "#;

        let mut conn = self.get_conn().await?;
        let rows: Vec<(String, String, String, Option<String>, Option<u64>)> = conn
            .exec(query, (table_name,))
            .await
            .map_err(GatewayError::driver(BACKEND))?;

        Ok(TableSchema::Relational(
            rows.into_iter()
                .map(|(column_name, data_type, is_nullable, column_default, max_length)| {
                    ColumnDescriptor {
                        column_name,
                        data_type,
                        is_nullable,
                        column_default,
                        character_maximum_length: max_length.and_then(|v| i64::try_from(v).ok()),
                    }
                })
                .collect(),
        ))
    }

    async fn ping(&self) -> Result<()> {
        // Get a connection from the pool to test
        let _conn = self.get_conn().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(GatewayError::driver(BACKEND))?;
        tracing::info!("Closed MySQL pool");
        Ok(())
    }
}
