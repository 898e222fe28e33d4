use crate::error::{GatewayError, Result};
use mongodb::bson::{Bson, Document};
use mongodb::options::UpdateModifications;
use serde_json::{Map, Value};

/// The ten operations a document command may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOperation {
    Find,
    FindOne,
    Aggregate,
    Count,
    InsertOne,
    InsertMany,
    UpdateOne,
    UpdateMany,
    DeleteOne,
    DeleteMany,
}

impl DocumentOperation {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "find" => Ok(DocumentOperation::Find),
            "find_one" => Ok(DocumentOperation::FindOne),
            "aggregate" => Ok(DocumentOperation::Aggregate),
            "count" => Ok(DocumentOperation::Count),
            "insert_one" => Ok(DocumentOperation::InsertOne),
            "insert_many" => Ok(DocumentOperation::InsertMany),
            "update_one" => Ok(DocumentOperation::UpdateOne),
            "update_many" => Ok(DocumentOperation::UpdateMany),
            "delete_one" => Ok(DocumentOperation::DeleteOne),
            "delete_many" => Ok(DocumentOperation::DeleteMany),
            _ => Err(GatewayError::UnsupportedOperation(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOperation::Find => "find",
            DocumentOperation::FindOne => "find_one",
            DocumentOperation::Aggregate => "aggregate",
            DocumentOperation::Count => "count",
            DocumentOperation::InsertOne => "insert_one",
            DocumentOperation::InsertMany => "insert_many",
            DocumentOperation::UpdateOne => "update_one",
            DocumentOperation::UpdateMany => "update_many",
            DocumentOperation::DeleteOne => "delete_one",
            DocumentOperation::DeleteMany => "delete_many",
        }
    }
}

/// Options for `find`, applied as filter, projection, sort, skip, limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub filter: Document,
    pub projection: Option<Document>,
    /// Field → direction pairs in caller order.
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

/// A parsed operation together with its payload.
#[derive(Debug, Clone)]
pub enum DocumentRequest {
    Find(FindSpec),
    FindOne {
        filter: Document,
        projection: Option<Document>,
    },
    Aggregate {
        pipeline: Vec<Document>,
    },
    Count {
        filter: Document,
    },
    InsertOne {
        document: Document,
    },
    InsertMany {
        documents: Vec<Document>,
    },
    UpdateOne {
        filter: Document,
        update: UpdateModifications,
    },
    UpdateMany {
        filter: Document,
        update: UpdateModifications,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

/// A document-store command decoded from its JSON wire form:
///
/// ```json
/// {"collection": "users", "operation": "find", "filter": {"active": true}, "limit": 10}
/// ```
///
/// Payload objects are read as MongoDB Extended JSON, so `{"$oid": "..."}`
/// and `{"$date": "..."}` literals become native values.
#[derive(Debug, Clone)]
pub struct DocumentCommand {
    pub collection: String,
    pub request: DocumentRequest,
}

impl DocumentCommand {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GatewayError::MalformedQuery(e.to_string()))?;

        let Value::Object(fields) = value else {
            return Err(GatewayError::MalformedQuery(
                "query must be a JSON object".to_string(),
            ));
        };

        // Checked before the operation so a missing collection always wins
        let collection = match fields.get("collection") {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => return Err(GatewayError::MissingCollection),
        };

        let operation = match fields.get("operation") {
            None | Some(Value::Null) => DocumentOperation::Find,
            Some(Value::String(name)) => DocumentOperation::from_name(name)?,
            Some(other) => return Err(GatewayError::UnsupportedOperation(other.to_string())),
        };

        let request = match operation {
            DocumentOperation::Find => DocumentRequest::Find(FindSpec {
                filter: document_or_empty(&fields, "filter")?,
                projection: optional_document(&fields, "projection")?,
                sort: optional_document(&fields, "sort")?,
                skip: optional_skip(&fields)?,
                limit: optional_limit(&fields)?,
            }),
            DocumentOperation::FindOne => DocumentRequest::FindOne {
                filter: document_or_empty(&fields, "filter")?,
                projection: optional_document(&fields, "projection")?,
            },
            DocumentOperation::Aggregate => DocumentRequest::Aggregate {
                pipeline: document_list(&fields, "pipeline")?,
            },
            DocumentOperation::Count => DocumentRequest::Count {
                filter: document_or_empty(&fields, "filter")?,
            },
            DocumentOperation::InsertOne => DocumentRequest::InsertOne {
                document: document_or_empty(&fields, "document")?,
            },
            DocumentOperation::InsertMany => DocumentRequest::InsertMany {
                documents: document_list(&fields, "documents")?,
            },
            DocumentOperation::UpdateOne => DocumentRequest::UpdateOne {
                filter: document_or_empty(&fields, "filter")?,
                update: update_modifications(&fields)?,
            },
            DocumentOperation::UpdateMany => DocumentRequest::UpdateMany {
                filter: document_or_empty(&fields, "filter")?,
                update: update_modifications(&fields)?,
            },
            DocumentOperation::DeleteOne => DocumentRequest::DeleteOne {
                filter: document_or_empty(&fields, "filter")?,
            },
            DocumentOperation::DeleteMany => DocumentRequest::DeleteMany {
                filter: document_or_empty(&fields, "filter")?,
            },
        };

        Ok(Self { collection, request })
    }

    pub fn operation(&self) -> DocumentOperation {
        match &self.request {
            DocumentRequest::Find(_) => DocumentOperation::Find,
            DocumentRequest::FindOne { .. } => DocumentOperation::FindOne,
            DocumentRequest::Aggregate { .. } => DocumentOperation::Aggregate,
            DocumentRequest::Count { .. } => DocumentOperation::Count,
            DocumentRequest::InsertOne { .. } => DocumentOperation::InsertOne,
            DocumentRequest::InsertMany { .. } => DocumentOperation::InsertMany,
            DocumentRequest::UpdateOne { .. } => DocumentOperation::UpdateOne,
            DocumentRequest::UpdateMany { .. } => DocumentOperation::UpdateMany,
            DocumentRequest::DeleteOne { .. } => DocumentOperation::DeleteOne,
            DocumentRequest::DeleteMany { .. } => DocumentOperation::DeleteMany,
        }
    }
}

/// Present, non-null payload under `key`.
fn payload<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn to_bson(key: &str, value: &Value) -> Result<Bson> {
    Bson::try_from(value.clone())
        .map_err(|e| GatewayError::MalformedQuery(format!("invalid '{}': {}", key, e)))
}

fn to_document(key: &str, value: &Value) -> Result<Document> {
    match to_bson(key, value)? {
        Bson::Document(doc) => Ok(doc),
        _ => Err(GatewayError::MalformedQuery(format!(
            "'{}' must be a JSON object",
            key
        ))),
    }
}

fn document_or_empty(fields: &Map<String, Value>, key: &str) -> Result<Document> {
    Ok(optional_document(fields, key)?.unwrap_or_default())
}

fn optional_document(fields: &Map<String, Value>, key: &str) -> Result<Option<Document>> {
    payload(fields, key).map(|v| to_document(key, v)).transpose()
}

fn document_list(fields: &Map<String, Value>, key: &str) -> Result<Vec<Document>> {
    match payload(fields, key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(|item| to_document(key, item)).collect(),
        Some(_) => Err(GatewayError::MalformedQuery(format!(
            "'{}' must be a JSON array of objects",
            key
        ))),
    }
}

fn update_modifications(fields: &Map<String, Value>) -> Result<UpdateModifications> {
    match payload(fields, "update") {
        Some(Value::Array(_)) => Ok(UpdateModifications::Pipeline(document_list(
            fields, "update",
        )?)),
        _ => Ok(UpdateModifications::Document(document_or_empty(
            fields, "update",
        )?)),
    }
}

fn optional_skip(fields: &Map<String, Value>) -> Result<Option<u64>> {
    payload(fields, "skip")
        .map(|v| {
            v.as_u64().ok_or_else(|| {
                GatewayError::MalformedQuery("'skip' must be a non-negative integer".to_string())
            })
        })
        .transpose()
}

fn optional_limit(fields: &Map<String, Value>) -> Result<Option<i64>> {
    payload(fields, "limit")
        .map(|v| {
            v.as_i64()
                .ok_or_else(|| GatewayError::MalformedQuery("'limit' must be an integer".to_string()))
        })
        .transpose()
}
