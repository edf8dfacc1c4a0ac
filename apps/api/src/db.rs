use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{CosmosConfig, KeyVaultConfig};
use crate::cosmos::{CosmosClient, StorageMode};

/// Creates the document store and provisions its database and containers.
/// Never fails: an unreachable account leaves the client running on the in-memory mock.
pub async fn connect_store(config: &CosmosConfig) -> Arc<CosmosClient> {
    let client = CosmosClient::new(config);
    match client.initialize().await {
        StorageMode::Cosmos => info!(database = %config.database, "Cosmos DB containers ready"),
        StorageMode::Mock if !config.use_mock => {
            warn!("Cosmos DB unavailable, continuing with the in-memory mock database")
        }
        StorageMode::Mock => {}
    }
    Arc::new(client)
}

/// Key Vault settings are reported only; secrets are always read from the environment.
pub fn report_key_vault(config: &KeyVaultConfig) {
    match (&config.url, config.enabled) {
        (Some(url), true) => info!(
            "USE_KEY_VAULT is set ({url}); secrets are taken from environment variables"
        ),
        (None, true) => warn!("USE_KEY_VAULT is set but AZURE_KEY_VAULT_URL is missing"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_config_yields_ready_mock_store() {
        let store = connect_store(&CosmosConfig {
            endpoint: None,
            key: None,
            database: "lifetracker".to_string(),
            use_mock: true,
        })
        .await;
        assert_eq!(store.mode(), StorageMode::Mock);
        assert_eq!(store.get_container("habits").await.id(), "habits");
    }
}
