// Capability contract shared by every backend client
use crate::error::Result;
use crate::models::{QueryParam, Record, TableSchema};
use crate::services::database::BackendKind;

/// Database client trait - one implementation per backend, each bound 1:1 to
/// a live connection pool. Every call acquires its own pooled connection and
/// hands it back on all exit paths.
#[async_trait::async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Backend identity this client talks to
    fn backend(&self) -> BackendKind;

    /// Execute a query and materialize every resulting record.
    ///
    /// Relational backends send `query` verbatim with `params` bound to
    /// native placeholders; statements without a result set return an empty
    /// vector. The document backend expects a JSON command and ignores `params`.
    async fn execute_query(&self, query: &str, params: &[QueryParam]) -> Result<Vec<Record>>;

    /// Names of the databases visible to this connection
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Tables (or collections) of `database`, or of the current one when `None`
    async fn list_tables(&self, database: Option<&str>) -> Result<Vec<String>>;

    /// Column metadata or inferred field layout of one table/collection
    async fn describe_table(&self, table_name: &str) -> Result<TableSchema>;

    /// Test connection
    async fn ping(&self) -> Result<()>;

    /// Release the connection pool
    async fn close(&self) -> Result<()>;
}
