// Pure document helpers: value serialization and schema inference
pub mod schema_inference;
pub mod serializer;

pub use schema_inference::{infer_schema, type_name, SAMPLE_SIZE};
pub use serializer::{serialize_document, serialize_value, MAX_NESTING_DEPTH};
