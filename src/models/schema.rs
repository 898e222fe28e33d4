use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column metadata from a relational backend's information schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i64>,
}

/// Field metadata inferred from sampled documents.
///
/// This is best-effort: `nullable` is always `true` because a sample can
/// never prove a field is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub field_name: String,
    pub types_found: Vec<String>,
    pub sample_values: Vec<Value>,
    pub nullable: bool,
    pub document_count: usize,
}

/// Result of `describe_table`. The two shapes are intentionally distinct.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSchema {
    Relational(Vec<ColumnDescriptor>),
    Document(Vec<FieldDescriptor>),
}

impl TableSchema {
    pub fn len(&self) -> usize {
        match self {
            TableSchema::Relational(columns) => columns.len(),
            TableSchema::Document(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into one JSON object per column/field, in descriptor order.
    pub fn into_rows(self) -> Vec<Value> {
        match self {
            TableSchema::Relational(columns) => columns.iter().map(to_row).collect(),
            TableSchema::Document(fields) => fields.iter().map(to_row).collect(),
        }
    }
}

fn to_row<T: Serialize>(descriptor: &T) -> Value {
    // Plain structs of strings, numbers and JSON values always serialize
    serde_json::to_value(descriptor).unwrap_or(Value::Null)
}
