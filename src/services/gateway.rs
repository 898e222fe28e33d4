use crate::error::Result;
use crate::services::formatter::format_results;
use crate::services::ConnectionManager;
use serde_json::Value;
use std::sync::Arc;

const QUERY_HELP: &str = r#"For PostgreSQL/MySQL send SQL text, e.g. "SELECT * FROM users WHERE active = true LIMIT 10".
For MongoDB send a JSON command:
  find:         {"collection": "users", "operation": "find", "filter": {"active": true}, "limit": 10}
  find_one:     {"collection": "users", "operation": "find_one", "filter": {"_id": {"$oid": "..."}}}
  insert_one:   {"collection": "users", "operation": "insert_one", "document": {"name": "John"}}
  insert_many:  {"collection": "users", "operation": "insert_many", "documents": [{...}, {...}]}
  update_one / update_many:
                {"collection": "users", "operation": "update_many", "filter": {...}, "update": {"$set": {...}}}
  delete_one / delete_many:
                {"collection": "users", "operation": "delete_many", "filter": {...}}
  aggregate:    {"collection": "users", "operation": "aggregate", "pipeline": [{"$group": {...}}]}
  count:        {"collection": "users", "operation": "count", "filter": {...}}
Optional fields for find: projection, sort, skip, limit"#;

/// The four text-returning operations handed to the transport layer.
///
/// Each call resolves the active client from the manager at call time, so a
/// gateway built before `connect()` starts working once the manager is
/// connected and fails with `NotConnected` otherwise.
#[derive(Clone)]
pub struct DataGateway {
    manager: Arc<ConnectionManager>,
}

impl DataGateway {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Usage notes for `execute_query`, suitable for a tool description.
    pub fn query_help() -> &'static str {
        QUERY_HELP
    }

    pub async fn execute_query(&self, query: &str, format_type: &str) -> Result<String> {
        let client = self.manager.client().await?;
        let records = client.execute_query(query, &[]).await?;
        let rows: Vec<Value> = records.into_iter().map(Value::Object).collect();
        Ok(format_results(&rows, format_type))
    }

    pub async fn list_databases(&self, format_type: &str) -> Result<String> {
        let client = self.manager.client().await?;
        let names = client.list_databases().await?;
        Ok(format_results(&into_rows(names), format_type))
    }

    pub async fn list_tables(&self, database: Option<&str>, format_type: &str) -> Result<String> {
        let client = self.manager.client().await?;
        let names = client.list_tables(database).await?;
        Ok(format_results(&into_rows(names), format_type))
    }

    pub async fn describe_table(&self, table_name: &str, format_type: &str) -> Result<String> {
        let client = self.manager.client().await?;
        let schema = client.describe_table(table_name).await?;
        Ok(format_results(&schema.into_rows(), format_type))
    }
}

fn into_rows(names: Vec<String>) -> Vec<Value> {
    names.into_iter().map(Value::String).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::models::Record;
    use crate::services::database::BackendKind;
    use crate::services::test_support::{database_config, FakeClient};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn gateway_with(fake: Arc<FakeClient>) -> DataGateway {
        let manager = ConnectionManager::with_client(database_config("postgres"), fake);
        DataGateway::new(Arc::new(manager))
    }

    #[tokio::test]
    async fn test_not_connected() {
        let gateway = DataGateway::new(Arc::new(ConnectionManager::new(database_config("postgres"))));

        let err = gateway.list_databases("json").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConnected));
    }

    #[tokio::test]
    async fn test_execute_query_formats_records() {
        let fake = Arc::new(FakeClient::with_records(
            BackendKind::Postgres,
            vec![
                record(json!({"id": 1, "name": "Ada"})),
                record(json!({"id": 22, "name": "Lin"})),
            ],
        ));
        let gateway = gateway_with(fake.clone());

        let lines = gateway.execute_query("SELECT id, name FROM users", "json").await.unwrap();
        assert_eq!(lines, "id: 1 | name: Ada\nid: 22 | name: Lin");

        let table = gateway.execute_query("SELECT id, name FROM users", "markdown").await.unwrap();
        assert_eq!(table, "id | name\n-- | ----\n1  | Ada \n22 | Lin ");

        assert_eq!(fake.queries(), vec!["SELECT id, name FROM users"; 2]);
    }

    #[tokio::test]
    async fn test_empty_result_in_markdown() {
        let gateway = gateway_with(Arc::new(FakeClient::new(BackendKind::Postgres)));

        let text = gateway.execute_query("DELETE FROM users", "markdown").await.unwrap();
        assert_eq!(text, "No results");
        assert_eq!(gateway.execute_query("DELETE FROM users", "json").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_listing_renders_one_name_per_line() {
        let gateway = gateway_with(Arc::new(FakeClient::new(BackendKind::MySql)));

        assert_eq!(gateway.list_databases("json").await.unwrap(), "admin\nappdb");
        assert_eq!(gateway.list_tables(None, "markdown").await.unwrap(), "orders\nusers");
        assert_eq!(
            gateway.list_tables(Some("archive"), "json").await.unwrap(),
            "old_orders"
        );
    }

    #[tokio::test]
    async fn test_describe_table_shapes() {
        let relational = gateway_with(Arc::new(FakeClient::new(BackendKind::Postgres)));
        let text = relational.describe_table("orders", "json").await.unwrap();
        assert_eq!(
            text,
            "column_name: orders_id | data_type: integer | is_nullable: NO | column_default: null | character_maximum_length: null"
        );

        let document = gateway_with(Arc::new(FakeClient::new(BackendKind::MongoDb)));
        let text = document.describe_table("orders", "json").await.unwrap();
        assert_eq!(
            text,
            r#"field_name: _id | types_found: ["objectId"] | sample_values: ["65f0c0ffee0000000000beef"] | nullable: true | document_count: 1"#
        );
    }

    #[test]
    fn test_help_mentions_every_operation() {
        for op in [
            "find", "find_one", "aggregate", "count", "insert_one", "insert_many",
            "update_one", "update_many", "delete_one", "delete_many",
        ] {
            assert!(DataGateway::query_help().contains(op), "{}", op);
        }
    }
}
