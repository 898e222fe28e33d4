// MongoDB client: JSON command interpreter over the driver's pooled client
use crate::config::DatabaseConfig;
use crate::error::{GatewayError, Result};
use crate::models::{DocumentCommand, DocumentRequest, FindSpec, QueryParam, Record, TableSchema};
use crate::services::database::adapter::DatabaseClient;
use crate::services::database::{mask_credentials, BackendKind};
use crate::services::document::{infer_schema, serialize_document, serialize_value, SAMPLE_SIZE};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions};
use mongodb::{Client, Collection, Cursor};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use url::Url;

const BACKEND: BackendKind = BackendKind::MongoDb;

pub struct MongoDbClient {
    client: Client,
    database: String,
}

impl MongoDbClient {
    /// Build the driver client (which owns its own pool) and ping the
    /// configured database so bad hosts or credentials fail here.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let uri = Self::connection_uri(config)?;

        tracing::info!(
            "Creating MongoDB client for {} (min: {}, max: {})",
            mask_credentials(&uri),
            config.min_pool_size,
            config.max_pool_size
        );

        let mut options = ClientOptions::parse(&uri)
            .await
            .map_err(GatewayError::driver(BACKEND))?;
        options.min_pool_size = Some(config.min_pool_size);
        options.max_pool_size = Some(config.max_pool_size);

        let client = Client::with_options(options).map_err(GatewayError::driver(BACKEND))?;

        let this = Self::new(client, &config.name);
        this.ping().await?;
        Ok(this)
    }

    pub fn new(client: Client, database: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
        }
    }

    fn connection_uri(config: &DatabaseConfig) -> Result<String> {
        let port = config.port.unwrap_or(BACKEND.default_port());
        let mut url = Url::parse(&format!("mongodb://{}:{}/", config.host, port))
            .map_err(|e| GatewayError::Configuration(format!("Invalid MongoDB host: {}", e)))?;

        if !config.user.is_empty() {
            url.set_username(&config.user)
                .and_then(|_| url.set_password(Some(&config.password)))
                .map_err(|_| {
                    GatewayError::Configuration("MongoDB URI cannot carry credentials".to_string())
                })?;
        }

        Ok(url.to_string())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.database).collection::<Document>(name)
    }

    async fn collect_records(cursor: Cursor<Document>) -> Result<Vec<Record>> {
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(GatewayError::driver(BACKEND))?;
        docs.iter().map(serialize_document).collect()
    }

    async fn find(collection: &Collection<Document>, spec: FindSpec) -> Result<Vec<Record>> {
        let (filter, options) = find_options(spec);

        let cursor = collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(GatewayError::driver(BACKEND))?;
        Self::collect_records(cursor).await
    }

    /// Run one parsed command and shape its result as records.
    async fn dispatch(&self, command: DocumentCommand) -> Result<Vec<Record>> {
        let collection = self.collection(&command.collection);

        match command.request {
            DocumentRequest::Find(spec) => Self::find(&collection, spec).await,

            DocumentRequest::FindOne { filter, projection } => {
                let mut options = FindOneOptions::default();
                options.projection = projection;

                let found = collection
                    .find_one(filter)
                    .with_options(options)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;

                // Not found is an empty result, never an error
                found.iter().map(serialize_document).collect()
            }

            DocumentRequest::Aggregate { pipeline } => {
                let cursor = collection
                    .aggregate(pipeline)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;
                Self::collect_records(cursor).await
            }

            DocumentRequest::Count { filter } => {
                let count = collection
                    .count_documents(filter)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;
                Ok(vec![count_record(count)])
            }

            DocumentRequest::InsertOne { document } => {
                let result = collection
                    .insert_one(document)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;
                Ok(vec![inserted_id_record(&result.inserted_id)])
            }

            DocumentRequest::InsertMany { documents } => {
                // The driver rejects an empty batch; nothing to insert is not a failure
                if documents.is_empty() {
                    return Ok(vec![inserted_ids_record(HashMap::new())]);
                }

                let result = collection
                    .insert_many(documents)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;

                Ok(vec![inserted_ids_record(result.inserted_ids)])
            }

            DocumentRequest::UpdateOne { filter, update } => {
                let result = collection
                    .update_one(filter, update)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;
                Ok(vec![update_record(result.matched_count, result.modified_count)])
            }

            DocumentRequest::UpdateMany { filter, update } => {
                let result = collection
                    .update_many(filter, update)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;
                Ok(vec![update_record(result.matched_count, result.modified_count)])
            }

            DocumentRequest::DeleteOne { filter } => {
                let result = collection
                    .delete_one(filter)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;
                Ok(vec![delete_record(result.deleted_count)])
            }

            DocumentRequest::DeleteMany { filter } => {
                let result = collection
                    .delete_many(filter)
                    .await
                    .map_err(GatewayError::driver(BACKEND))?;
                Ok(vec![delete_record(result.deleted_count)])
            }
        }
    }
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Split a find request into its filter and driver options.
fn find_options(spec: FindSpec) -> (Document, FindOptions) {
    let mut options = FindOptions::default();
    options.projection = spec.projection;
    options.sort = spec.sort;
    options.skip = spec.skip;
    options.limit = spec.limit;
    (spec.filter, options)
}

fn count_record(count: u64) -> Record {
    record(json!({ "count": count }))
}

fn inserted_id_record(id: &Bson) -> Record {
    record(json!({ "inserted_id": id_to_string(id) }))
}

/// The driver reports ids keyed by batch index; emit them in insertion order.
fn inserted_ids_record(ids: HashMap<usize, Bson>) -> Record {
    let mut ids: Vec<(usize, Bson)> = ids.into_iter().collect();
    ids.sort_by_key(|(index, _)| *index);
    let ids: Vec<String> = ids.iter().map(|(_, id)| id_to_string(id)).collect();
    record(json!({ "inserted_ids": ids }))
}

fn update_record(matched: u64, modified: u64) -> Record {
    record(json!({ "matched": matched, "modified": modified }))
}

fn delete_record(deleted: u64) -> Record {
    record(json!({ "deleted": deleted }))
}

/// Stringify a generated `_id`; ObjectIds become hex, never numbers.
fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => match serialize_value(other) {
            Ok(Value::String(s)) => s,
            Ok(value) => value.to_string(),
            Err(_) => other.to_string(),
        },
    }
}

#[async_trait::async_trait]
impl DatabaseClient for MongoDbClient {
    fn backend(&self) -> BackendKind {
        BACKEND
    }

    async fn execute_query(&self, query: &str, _params: &[QueryParam]) -> Result<Vec<Record>> {
        let command = DocumentCommand::parse(query)?;
        let operation = command.operation();
        let collection = command.collection.clone();
        let start_time = Instant::now();

        let records = self.dispatch(command).await?;

        tracing::debug!(
            "MongoDB {} on '{}' returned {} records in {} ms",
            operation.as_str(),
            collection,
            records.len(),
            start_time.elapsed().as_millis()
        );

        Ok(records)
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        self.client
            .list_database_names()
            .await
            .map_err(GatewayError::driver(BACKEND))
    }

    async fn list_tables(&self, database: Option<&str>) -> Result<Vec<String>> {
        let name = database.unwrap_or(&self.database);
        self.client
            .database(name)
            .list_collection_names()
            .await
            .map_err(GatewayError::driver(BACKEND))
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableSchema> {
        let mut options = FindOptions::default();
        options.limit = Some(SAMPLE_SIZE);

        let cursor = self
            .collection(table_name)
            .find(doc! {})
            .with_options(options)
            .await
            .map_err(GatewayError::driver(BACKEND))?;
        let sample: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(GatewayError::driver(BACKEND))?;

        tracing::debug!(
            "Inferring schema of '{}' from {} sampled documents",
            table_name,
            sample.len()
        );

        Ok(TableSchema::Document(infer_schema(&sample)?))
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(GatewayError::driver(BACKEND))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        tracing::info!("Closed MongoDB client for database '{}'", self.database);
        Ok(())
    }
}
