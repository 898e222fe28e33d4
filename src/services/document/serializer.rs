//! BSON → JSON conversion for everything the document backend returns.
//!
//! Every leaf comes out as a plain JSON scalar or string, at any depth:
//!
//! | BSON                 | JSON                                   |
//! |----------------------|----------------------------------------|
//! | ObjectId             | 24-char hex string                     |
//! | DateTime             | RFC 3339 string                        |
//! | Decimal128           | decimal string                         |
//! | Binary (UUID)        | hyphenated UUID string                 |
//! | Binary (other)       | lowercase hex string                   |
//! | Timestamp            | `{"t": seconds, "i": increment}`       |
//! | Regex                | `"/pattern/options"`                   |
//! | NaN / ±inf           | `"NaN"`, `"inf"`, `"-inf"`             |
//! | Undefined            | `null`                                 |
//! | MinKey / MaxKey      | `"MinKey"` / `"MaxKey"`                |

use crate::error::{GatewayError, Result};
use crate::models::Record;
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{Binary, Bson, Document};
use serde_json::{json, Number, Value};

/// Deepest container nesting accepted, matching the server's own BSON limit.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Serialize a whole document into a record, preserving field order.
pub fn serialize_document(doc: &Document) -> Result<Record> {
    document_to_json(doc, 1)
}

/// Serialize any single BSON value.
pub fn serialize_value(value: &Bson) -> Result<Value> {
    to_json(value, 0)
}

fn document_to_json(doc: &Document, depth: usize) -> Result<Record> {
    if depth > MAX_NESTING_DEPTH {
        return Err(GatewayError::NestingTooDeep(MAX_NESTING_DEPTH));
    }

    let mut record = Record::new();
    for (key, value) in doc {
        record.insert(key.clone(), to_json(value, depth)?);
    }
    Ok(record)
}

fn to_json(value: &Bson, depth: usize) -> Result<Value> {
    let json = match value {
        Bson::Document(doc) => Value::Object(document_to_json(doc, depth + 1)?),
        Bson::Array(items) => {
            if depth + 1 > MAX_NESTING_DEPTH {
                return Err(GatewayError::NestingTooDeep(MAX_NESTING_DEPTH));
            }
            Value::Array(
                items
                    .iter()
                    .map(|item| to_json(item, depth + 1))
                    .collect::<Result<_>>()?,
            )
        }
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Bson::String(s) | Bson::Symbol(s) | Bson::JavaScriptCode(s) => Value::String(s.clone()),
        Bson::JavaScriptCodeWithScope(code) => Value::String(code.code.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        ),
        Bson::Timestamp(ts) => json!({ "t": ts.time, "i": ts.increment }),
        Bson::Binary(binary) => Value::String(binary_to_string(binary)),
        Bson::RegularExpression(regex) => {
            Value::String(format!("/{}/{}", regex.pattern, regex.options))
        }
        Bson::Decimal128(_) => match value.clone().into_relaxed_extjson() {
            Value::Object(mut wrapper) => wrapper
                .remove("$numberDecimal")
                .unwrap_or(Value::Null),
            other => other,
        },
        Bson::MinKey => Value::String("MinKey".to_string()),
        Bson::MaxKey => Value::String("MaxKey".to_string()),
        Bson::DbPointer(_) => Value::String(value.to_string()),
    };
    Ok(json)
}

fn binary_to_string(binary: &Binary) -> String {
    if binary.subtype == BinarySubtype::Uuid {
        if let Ok(uuid) = uuid::Uuid::from_slice(&binary.bytes) {
            return uuid.hyphenated().to_string();
        }
    }
    binary.bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use mongodb::bson::{doc, DateTime, Timestamp};

    /// True when no object anywhere in `value` carries an Extended JSON `$` key.
    fn only_plain_leaves(value: &Value) -> bool {
        match value {
            Value::Object(map) => map
                .iter()
                .all(|(k, v)| !k.starts_with('$') && only_plain_leaves(v)),
            Value::Array(items) => items.iter().all(only_plain_leaves),
            _ => true,
        }
    }

    #[test]
    fn test_nested_identifiers_and_dates_round_trip_as_strings() {
        let oid = ObjectId::new();
        let when = DateTime::from_millis(1_700_000_000_000);
        let doc = doc! {
            "_id": oid,
            "created": when,
            "owner": {
                "ref": oid,
                "history": [ { "at": when }, [ oid ] ],
            },
        };

        let record = serialize_document(&doc).unwrap();
        let text = serde_json::to_string(&record).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();

        assert!(only_plain_leaves(&reparsed));
        assert_eq!(reparsed["_id"], json!(oid.to_hex()));
        assert_eq!(reparsed["owner"]["history"][1][0], json!(oid.to_hex()));
        assert_eq!(
            reparsed["owner"]["history"][0]["at"],
            json!(when.try_to_rfc3339_string().unwrap())
        );
    }

    #[test]
    fn test_field_order_is_preserved() {
        let record = serialize_document(&doc! { "z": 1, "a": 2, "m": 3 }).unwrap();
        let keys: Vec<&String> = record.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(serialize_value(&Bson::Double(f64::NAN)).unwrap(), json!("NaN"));
        assert_eq!(serialize_value(&Bson::Undefined).unwrap(), Value::Null);
        assert_eq!(serialize_value(&Bson::MaxKey).unwrap(), json!("MaxKey"));
        assert_eq!(
            serialize_value(&Bson::Timestamp(Timestamp { time: 10, increment: 2 })).unwrap(),
            json!({ "t": 10, "i": 2 })
        );
        assert_eq!(
            serialize_value(&Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: vec![0xde, 0xad],
            }))
            .unwrap(),
            json!("dead")
        );
    }

    #[test]
    fn test_uuid_binary() {
        let uuid = uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let value = Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: uuid.as_bytes().to_vec(),
        });
        assert_eq!(
            serialize_value(&value).unwrap(),
            json!("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }

    #[test]
    fn test_rejects_excessive_nesting() {
        let mut value = Bson::Int32(1);
        for _ in 0..=MAX_NESTING_DEPTH {
            value = Bson::Document(doc! { "inner": value });
        }
        assert!(matches!(
            serialize_value(&value),
            Err(GatewayError::NestingTooDeep(MAX_NESTING_DEPTH))
        ));
    }

    #[test]
    fn test_accepts_nesting_at_the_limit() {
        let mut doc = doc! { "leaf": 1 };
        for _ in 1..MAX_NESTING_DEPTH {
            doc = doc! { "inner": doc };
        }
        assert!(serialize_document(&doc).is_ok());
    }
}
