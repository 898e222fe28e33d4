// Shared fixtures for unit tests
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{ColumnDescriptor, FieldDescriptor, QueryParam, Record, TableSchema};
use crate::services::database::{BackendKind, DatabaseClient};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn database_config(provider: &str) -> DatabaseConfig {
    DatabaseConfig {
        provider: provider.to_string(),
        host: "localhost".to_string(),
        port: None,
        user: "app".to_string(),
        password: "secret".to_string(),
        name: "appdb".to_string(),
        min_pool_size: 1,
        max_pool_size: 4,
    }
}

/// In-memory client recording what it was asked.
pub(crate) struct FakeClient {
    backend: BackendKind,
    records: Vec<Record>,
    queries: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl FakeClient {
    pub(crate) fn new(backend: BackendKind) -> Self {
        Self::with_records(backend, Vec::new())
    }

    pub(crate) fn with_records(backend: BackendKind, records: Vec<Record>) -> Self {
        Self {
            backend,
            records,
            queries: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DatabaseClient for FakeClient {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn execute_query(&self, query: &str, _params: &[QueryParam]) -> Result<Vec<Record>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        Ok(self.records.clone())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(vec!["admin".to_string(), "appdb".to_string()])
    }

    async fn list_tables(&self, database: Option<&str>) -> Result<Vec<String>> {
        match database {
            Some("archive") => Ok(vec!["old_orders".to_string()]),
            _ => Ok(vec!["orders".to_string(), "users".to_string()]),
        }
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableSchema> {
        if self.backend.is_relational() {
            Ok(TableSchema::Relational(vec![ColumnDescriptor {
                column_name: format!("{}_id", table_name),
                data_type: "integer".to_string(),
                is_nullable: "NO".to_string(),
                column_default: None,
                character_maximum_length: None,
            }]))
        } else {
            Ok(TableSchema::Document(vec![FieldDescriptor {
                field_name: "_id".to_string(),
                types_found: vec!["objectId".to_string()],
                sample_values: vec![json!("65f0c0ffee0000000000beef")],
                nullable: true,
                document_count: 1,
            }]))
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
