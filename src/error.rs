use crate::services::database::BackendKind;
use thiserror::Error;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unsupported database provider: {0}")]
    UnsupportedBackend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database not connected. Call connect() first.")]
    NotConnected,

    #[error("Invalid JSON query format: {0}")]
    MalformedQuery(String),

    #[error("Collection name is required")]
    MissingCollection,

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Value nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// A native driver failure, passed through as-is and labelled with the backend.
    #[error("{backend} error: {source}")]
    Driver {
        backend: BackendKind,
        #[source]
        source: DriverError,
    },
}

/// Native errors from the backend drivers. No translation is applied.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[error(transparent)]
    PostgresPool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    PostgresPoolBuild(#[from] deadpool_postgres::CreatePoolError),

    #[error(transparent)]
    MySql(#[from] mysql_async::Error),

    #[error(transparent)]
    MongoDb(#[from] mongodb::error::Error),
}

impl GatewayError {
    /// Returns a `map_err` adapter labelling a driver error with its backend.
    pub fn driver<E>(backend: BackendKind) -> impl FnOnce(E) -> Self
    where
        E: Into<DriverError>,
    {
        move |err| GatewayError::Driver {
            backend,
            source: err.into(),
        }
    }
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
