use crate::error::{GatewayError, Result};
use crate::models::FieldDescriptor;
use crate::services::document::serializer::{serialize_value, MAX_NESTING_DEPTH};
use mongodb::bson::{Bson, Document};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Documents sampled per `describe_table` call.
pub const SAMPLE_SIZE: i64 = 100;

const RETAINED_SAMPLES: usize = 5;
const REPORTED_SAMPLES: usize = 3;

#[derive(Default)]
struct FieldStats {
    types: BTreeSet<&'static str>,
    samples: Vec<Value>,
}

/// Infer an approximate field layout from sampled documents.
///
/// Nested object keys are reported under dotted paths (`address.city`);
/// arrays are recorded as `array` and not descended into. Descriptors come
/// back sorted by path. An empty sample yields an empty layout.
pub fn infer_schema(docs: &[Document]) -> Result<Vec<FieldDescriptor>> {
    let mut fields: BTreeMap<String, FieldStats> = BTreeMap::new();
    for doc in docs {
        walk_document(doc, &mut fields)?;
    }

    Ok(fields
        .into_iter()
        .map(|(field_name, stats)| FieldDescriptor {
            field_name,
            types_found: stats.types.into_iter().map(str::to_string).collect(),
            sample_values: stats.samples.into_iter().take(REPORTED_SAMPLES).collect(),
            nullable: true,
            document_count: docs.len(),
        })
        .collect())
}

fn walk_document(doc: &Document, fields: &mut BTreeMap<String, FieldStats>) -> Result<()> {
    let mut pending: Vec<(String, &Document, usize)> = vec![(String::new(), doc, 1)];

    while let Some((prefix, current, depth)) = pending.pop() {
        if depth > MAX_NESTING_DEPTH {
            return Err(GatewayError::NestingTooDeep(MAX_NESTING_DEPTH));
        }

        for (key, value) in current {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };

            let stats = fields.entry(path.clone()).or_default();
            stats.types.insert(type_name(value));
            if stats.samples.len() < RETAINED_SAMPLES {
                stats.samples.push(serialize_value(value)?);
            }

            if let Bson::Document(nested) = value {
                pending.push((path, nested, depth + 1));
            }
        }
    }

    Ok(())
}

/// MongoDB `$type` alias of a value.
pub fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Binary(_) => "binData",
        Bson::Undefined => "undefined",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::DbPointer(_) => "dbPointer",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::Symbol(_) => "symbol",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Timestamp(_) => "timestamp",
        Bson::Int64(_) => "long",
        Bson::Decimal128(_) => "decimal",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn test_empty_sample_yields_empty_layout() {
        assert!(infer_schema(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_mixed_types_are_both_reported() {
        let docs: Vec<Document> = (0..100)
            .map(|i| {
                if i < 60 {
                    doc! { "x": i }
                } else {
                    doc! { "x": format!("v{}", i) }
                }
            })
            .collect();

        let fields = infer_schema(&docs).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_name, "x");
        assert_eq!(fields[0].types_found, vec!["int", "string"]);
        assert_eq!(fields[0].document_count, 100);
        assert_eq!(fields[0].sample_values, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_nested_paths_sorted() {
        let docs = vec![
            doc! { "name": "Ada", "address": { "zip": "0150", "city": "Oslo" } },
            doc! { "name": "Lin", "tags": ["a", "b"] },
        ];

        let fields = infer_schema(&docs).unwrap();
        let paths: Vec<&str> = fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(
            paths,
            vec!["address", "address.city", "address.zip", "name", "tags"]
        );

        let address = &fields[0];
        assert_eq!(address.types_found, vec!["object"]);
        assert_eq!(
            address.sample_values,
            vec![json!({ "zip": "0150", "city": "Oslo" })]
        );
        assert!(fields.iter().all(|f| f.nullable && f.document_count == 2));
        assert_eq!(fields[4].types_found, vec!["array"]);
    }

    #[test]
    fn test_samples_are_serialized() {
        let oid = ObjectId::new();
        let fields = infer_schema(&[doc! { "_id": oid }]).unwrap();

        assert_eq!(fields[0].types_found, vec!["objectId"]);
        assert_eq!(fields[0].sample_values, vec![json!(oid.to_hex())]);
    }

    #[test]
    fn test_at_most_three_samples_reported() {
        let docs: Vec<Document> = (0..10).map(|i| doc! { "n": i }).collect();
        let fields = infer_schema(&docs).unwrap();
        assert_eq!(fields[0].sample_values.len(), 3);
    }

    #[test]
    fn test_deep_documents_are_rejected() {
        let mut doc = doc! { "leaf": true };
        for _ in 0..MAX_NESTING_DEPTH {
            doc = doc! { "inner": doc };
        }
        assert!(matches!(
            infer_schema(&[doc]),
            Err(GatewayError::NestingTooDeep(_))
        ));
    }
}
