use anyhow::Context;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};

use self::notifier::{NoopNotifier, Notifier, PushGatewayNotifier};
use self::store::{FormStore, MemoryFormStore, MongoFormStore};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn FormStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn FormStore> = match config.storage_backend {
            StorageBackend::Mongo => {
                let client = mongodb::Client::with_uri_str(&config.mongo_uri)
                    .await
                    .context("Failed to connect to MongoDB")?;
                let store = MongoFormStore::new(client.database(&config.mongo_database));

                tokio::time::timeout(std::time::Duration::from_secs(5), store.ping())
                    .await
                    .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;
                tracing::info!("MongoDB connected, database={}", config.mongo_database);

                if let Err(e) = store.ensure_indexes().await {
                    tracing::warn!("Could not create indexes: {:?}", e);
                }
                Arc::new(store)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on restart");
                Arc::new(MemoryFormStore::new())
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.notify_url {
            Some(url) => Arc::new(PushGatewayNotifier::new(url.clone())),
            None => Arc::new(NoopNotifier),
        };

        Ok(Self::with_backends(config, store, notifier))
    }

    pub fn with_backends(
        config: Config,
        store: Arc<dyn FormStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
        }
    }
}

pub mod analytics;
pub mod form_service;
pub mod notifier;
pub mod scoring;
pub mod store;
pub mod validation;
