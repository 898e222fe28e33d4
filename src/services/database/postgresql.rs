// PostgreSQL client using connection pooling for optimal resource management
use crate::config::DatabaseConfig;
use crate::error::{GatewayError, Result};
use crate::models::{ColumnDescriptor, QueryParam, Record, TableSchema};
use crate::services::database::adapter::DatabaseClient;
use crate::services::database::BackendKind;
use bytes::BytesMut;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Instant;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::{NoTls, Row};

const BACKEND: BackendKind = BackendKind::Postgres;

pub struct PostgresClient {
    pool: Pool,
    database: String,
}

impl PostgresClient {
    /// Build the pool and open `min_pool_size` connections up front.
    ///
    /// Opening the warm connections is also the connectivity probe: bad
    /// credentials or an unreachable host fail here.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut cfg = PoolConfig::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port.unwrap_or(BACKEND.default_port()));
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.dbname = Some(config.name.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(config.max_pool_size as usize));

        tracing::info!(
            "Creating PostgreSQL pool for {}@{}:{}/{} (min: {}, max: {})",
            config.user,
            config.host,
            cfg.port.unwrap_or_default(),
            config.name,
            config.min_pool_size,
            config.max_pool_size
        );

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(GatewayError::driver(BACKEND))?;

        let warm = config.min_pool_size.max(1) as usize;
        let connections = futures::future::try_join_all((0..warm).map(|_| pool.get()))
            .await
            .map_err(GatewayError::driver(BACKEND))?;
        drop(connections);

        Ok(Self {
            pool,
            database: config.name.clone(),
        })
    }

    /// Get a connection from the pool; it returns to the pool when dropped
    async fn get_conn(&self) -> Result<Object> {
        self.pool.get().await.map_err(GatewayError::driver(BACKEND))
    }

    /// Convert one row into a record, keeping column order
    fn row_to_record(row: &Row) -> Record {
        let mut record = Record::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let value = match row.try_get::<_, Option<RawCell<'_>>>(idx) {
                Ok(Some(RawCell(raw))) => decode_cell(column.type_(), raw),
                _ => Value::Null,
            };
            record.insert(column.name().to_string(), value);
        }
        record
    }
}

/// Borrows a cell's binary wire value so it can be decoded by column type.
struct RawCell<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawCell<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(RawCell(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// Decode one non-null cell. Types without a dedicated arm (enums, citext,
/// domains over text) arrive as text in binary format; anything that fails
/// to decode falls back to its text or hex form instead of being dropped.
fn decode_cell(ty: &Type, raw: &[u8]) -> Value {
    let decoded: std::result::Result<Value, BoxError> = match *ty {
        Type::INT2 => i16::from_sql(ty, raw).map(Value::from),
        Type::INT4 => i32::from_sql(ty, raw).map(Value::from),
        Type::INT8 => i64::from_sql(ty, raw).map(Value::from),
        Type::OID => u32::from_sql(ty, raw).map(Value::from),
        Type::FLOAT4 => f32::from_sql(ty, raw).map(Value::from),
        Type::FLOAT8 => f64::from_sql(ty, raw).map(Value::from),
        Type::BOOL => bool::from_sql(ty, raw).map(Value::from),
        Type::CHAR => i8::from_sql(ty, raw).map(|c| Value::from(char::from(c as u8).to_string())),
        Type::NUMERIC => Decimal::from_sql(ty, raw)
            .map(|d| Value::from(d.to_string()))
            .or_else(|e| numeric_special(raw).map(Value::from).ok_or(e)),
        Type::TIMESTAMP => chrono::NaiveDateTime::from_sql(ty, raw).map(|v| Value::from(v.to_string())),
        Type::TIMESTAMPTZ => {
            chrono::DateTime::<chrono::Utc>::from_sql(ty, raw).map(|v| Value::from(v.to_rfc3339()))
        }
        Type::DATE => chrono::NaiveDate::from_sql(ty, raw).map(|v| Value::from(v.to_string())),
        Type::TIME => chrono::NaiveTime::from_sql(ty, raw).map(|v| Value::from(v.to_string())),
        Type::INTERVAL => interval_to_string(raw).map(Value::from),
        Type::UUID => uuid::Uuid::from_sql(ty, raw).map(|v| Value::from(v.to_string())),
        Type::JSON | Type::JSONB => Value::from_sql(ty, raw),
        Type::BYTEA => Ok(Value::from(format!("\\x{}", hex(raw)))),
        _ => Ok(text_or_hex(raw)),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!("Falling back to raw form for {} cell: {}", ty.name(), e);
        text_or_hex(raw)
    })
}

fn text_or_hex(raw: &[u8]) -> Value {
    match std::str::from_utf8(raw) {
        Ok(text) => Value::from(text),
        Err(_) => Value::from(format!("\\x{}", hex(raw))),
    }
}

fn hex(raw: &[u8]) -> String {
    raw.iter().map(|b| format!("{:02x}", b)).collect()
}

/// NUMERIC NaN and infinities, which `Decimal` cannot hold.
fn numeric_special(raw: &[u8]) -> Option<&'static str> {
    let sign = u16::from_be_bytes([*raw.get(4)?, *raw.get(5)?]);
    match sign {
        0xC000 => Some("NaN"),
        0xD000 => Some("Infinity"),
        0xF000 => Some("-Infinity"),
        _ => None,
    }
}

/// Render a binary INTERVAL the way psql prints it, e.g. `1 year 2 mons 3 days 04:05:06`.
fn interval_to_string(raw: &[u8]) -> std::result::Result<String, BoxError> {
    if raw.len() != 16 {
        return Err(format!("invalid interval length {}", raw.len()).into());
    }
    let micros = i64::from_be_bytes(raw[0..8].try_into()?);
    let days = i32::from_be_bytes(raw[8..12].try_into()?);
    let months = i32::from_be_bytes(raw[12..16].try_into()?);

    let unit = |n: i32, name: &str| format!("{} {}{}", n, name, if n.abs() == 1 { "" } else { "s" });
    let mut parts = Vec::new();
    if months / 12 != 0 {
        parts.push(unit(months / 12, "year"));
    }
    if months % 12 != 0 {
        parts.push(unit(months % 12, "mon"));
    }
    if days != 0 {
        parts.push(unit(days, "day"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let mut time = format!("{}{:02}:{:02}:{:02}", sign, secs / 3600, secs / 60 % 60, secs % 60);
        let frac = total % 1_000_000;
        if frac != 0 {
            time.push_str(format!(".{:06}", frac).trim_end_matches('0'));
        }
        parts.push(time);
    }
    Ok(parts.join(" "))
}

/// Binds a [`QueryParam`] to whatever type the server inferred for its placeholder.
#[derive(Debug)]
struct PgParam<'a>(&'a QueryParam);

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, BoxError> {
        match self.0 {
            QueryParam::Null => Ok(IsNull::Yes),
            QueryParam::Bool(v) => v.to_sql(ty, out),
            QueryParam::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            QueryParam::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            QueryParam::Text(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[async_trait::async_trait]
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> BackendKind {
        BACKEND
    }

    async fn execute_query(&self, query: &str, params: &[QueryParam]) -> Result<Vec<Record>> {
        let client = self.get_conn().await?;
        let start_time = Instant::now();

        let bound: Vec<PgParam<'_>> = params.iter().map(PgParam).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        // Runs outside any explicit transaction, so DML commits immediately
        let rows = client
            .query(query, &refs)
            .await
            .map_err(GatewayError::driver(BACKEND))?;

        let records: Vec<Record> = rows.iter().map(Self::row_to_record).collect();

        tracing::debug!(
            "PostgreSQL query returned {} rows in {} ms",
            records.len(),
            start_time.elapsed().as_millis()
        );

        Ok(records)
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let client = self.get_conn().await?;
        let rows = client
            .query("SELECT datname FROM pg_database WHERE datistemplate = false", &[])
            .await
            .map_err(GatewayError::driver(BACKEND))?;

        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<std::result::Result<_, _>>()
            .map_err(GatewayError::driver(BACKEND))
    }

    async fn list_tables(&self, database: Option<&str>) -> Result<Vec<String>> {
        let client = self.get_conn().await?;

        // A PostgreSQL session cannot switch databases, so a named database
        // only matches when it is the one this pool is connected to
        let rows = match database {
            Some(name) => {
                client
                    .query(
                        r#"
                        SELECT tablename FROM pg_tables
                        WHERE schemaname = 'public' AND current_database() = $1::text
                        ORDER BY tablename
                        "#,
                        &[&name],
                    )
                    .await
            }
            None => {
                client
                    .query(
                        "SELECT tablename FROM pg_tables WHERE schemaname = 'public' ORDER BY tablename",
                        &[],
                    )
                    .await
            }
        }
        .map_err(GatewayError::driver(BACKEND))?;

        if database.is_some_and(|name| name != self.database) {
            tracing::debug!(
                "Listing tables of '{}' from a pool connected to '{}'",
                database.unwrap_or_default(),
                self.database
            );
        }

        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<std::result::Result<_, _>>()
            .map_err(GatewayError::driver(BACKEND))
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableSchema> {
        let client = self.get_conn().await?;
        let rows = client
            .query(
                r#"
                SELECT
                    column_name::text,
                    data_type::text,
                    is_nullable::text,
                    column_default::text,
                    character_maximum_length::int8
                FROM information_schema.columns
                WHERE table_schema = current_schema() AND table_name::text = $1
                ORDER BY ordinal_position
                "#,
                &[&table_name],
            )
            .await
            .map_err(GatewayError::driver(BACKEND))?;

        let columns = rows
            .iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    column_name: row.try_get(0)?,
                    data_type: row.try_get(1)?,
                    is_nullable: row.try_get(2)?,
                    column_default: row.try_get(3)?,
                    character_maximum_length: row.try_get(4)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(GatewayError::driver(BACKEND))?;

        Ok(TableSchema::Relational(columns))
    }

    async fn ping(&self) -> Result<()> {
        // Get a connection from the pool to test
        let _client = self.get_conn().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        tracing::info!("Closed PostgreSQL pool for database '{}'", self.database);
        Ok(())
    }
}
