pub mod document_command;
pub mod record;
pub mod schema;

pub use document_command::*;
pub use record::*;
pub use schema::*;
