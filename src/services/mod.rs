pub mod connection_manager;
pub mod database; // Backend clients: PostgreSQL, MySQL, MongoDB
pub mod document; // BSON serialization and schema inference
pub mod formatter;
pub mod gateway;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection_manager::*;
pub use database::{create_client, BackendKind, DatabaseClient};
pub use formatter::{format_results, OutputFormat};
pub use gateway::*;
