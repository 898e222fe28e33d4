use crate::config::DatabaseConfig;
use crate::error::{GatewayError, Result};
use crate::services::database::{create_client, BackendKind, DatabaseClient};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owns backend selection and the lifecycle of the one active client.
///
/// Valid between a successful [`connect`](Self::connect) and the next
/// [`disconnect`](Self::disconnect); outside that window [`client`](Self::client)
/// fails with [`GatewayError::NotConnected`]. The manager is an ordinary
/// value: share it with `Arc` rather than through global state.
pub struct ConnectionManager {
    config: DatabaseConfig,
    active: RwLock<Option<Arc<dyn DatabaseClient>>>,
}

impl ConnectionManager {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            active: RwLock::new(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_client(config: DatabaseConfig, client: Arc<dyn DatabaseClient>) -> Self {
        Self {
            config,
            active: RwLock::new(Some(client)),
        }
    }

    /// Select the configured backend, build its pool and store the client.
    ///
    /// Calling this while connected swaps in a fresh client and closes the
    /// old one afterwards.
    pub async fn connect(&self) -> Result<()> {
        let kind = BackendKind::from_str(&self.config.provider)?;

        tracing::info!("Connecting to {} backend", kind);
        let client = create_client(kind, &self.config).await?;

        let previous = self.active.write().await.replace(client);
        if let Some(previous) = previous {
            tracing::warn!("Replacing active {} client", previous.backend());
            if let Err(e) = previous.close().await {
                tracing::warn!("Failed to close replaced client: {}", e);
            }
        }

        tracing::info!("Successfully connected to {} backend", kind);
        Ok(())
    }

    /// Close the active pool, if any. Safe to call when not connected.
    pub async fn disconnect(&self) -> Result<()> {
        let client = self.active.write().await.take();

        if let Some(client) = client {
            let kind = client.backend();
            client.close().await?;
            tracing::info!("Disconnected from {} backend", kind);
        }
        Ok(())
    }

    /// The active client.
    pub async fn client(&self) -> Result<Arc<dyn DatabaseClient>> {
        self.active
            .read()
            .await
            .clone()
            .ok_or(GatewayError::NotConnected)
    }

    pub async fn is_connected(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Backend of the active client, if connected.
    pub async fn backend(&self) -> Option<BackendKind> {
        self.active.read().await.as_ref().map(|c| c.backend())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{database_config, FakeClient};
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_client_before_connect_fails() {
        let manager = ConnectionManager::new(database_config("postgres"));

        assert!(matches!(manager.client().await, Err(GatewayError::NotConnected)));
        assert!(!manager.is_connected().await);
        assert_eq!(manager.backend().await, None);
    }

    #[tokio::test]
    async fn test_unsupported_backend_creates_nothing() {
        let manager = ConnectionManager::new(database_config("oracle"));

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedBackend(ref p) if p == "oracle"));
        assert!(matches!(manager.client().await, Err(GatewayError::NotConnected)));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let manager = ConnectionManager::new(database_config("mysql"));

        assert_ok!(manager.disconnect().await);
        assert_ok!(manager.disconnect().await);
    }

    #[tokio::test]
    async fn test_disconnect_closes_and_clears_client() {
        let fake = Arc::new(FakeClient::new(BackendKind::Postgres));
        let manager = ConnectionManager::with_client(database_config("postgres"), fake.clone());

        assert!(manager.client().await.is_ok());
        assert_eq!(manager.backend().await, Some(BackendKind::Postgres));

        assert_ok!(manager.disconnect().await);
        assert!(fake.is_closed());
        assert!(matches!(manager.client().await, Err(GatewayError::NotConnected)));

        assert_ok!(manager.disconnect().await);
        assert_eq!(fake.close_calls(), 1);
    }
}
