use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Mongo => "mongo",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    /// Push gateway endpoint; notifications are skipped when unset.
    pub notify_url: Option<String>,
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides (prefix: APP_)
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "formcraft".to_string());

        let notify_url = settings
            .get_string("notifications.url")
            .or_else(|_| env::var("NOTIFY_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let storage_backend = settings
            .get_string("storage.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
            .unwrap_or_else(|_| "mongo".to_string())
            .parse::<StorageBackend>()
            .map_err(config::ConfigError::Message)?;

        if notify_url.is_none() {
            tracing::warn!("NOTIFY_URL is not set, publish notifications are disabled");
        }

        Ok(Config {
            mongo_uri,
            mongo_database,
            notify_url,
            bind_addr,
            storage_backend,
        })
    }

    /// In-memory configuration without a push gateway.
    pub fn in_memory() -> Self {
        Config {
            mongo_uri: String::new(),
            mongo_database: "formcraft".to_string(),
            notify_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            storage_backend: StorageBackend::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_names() {
        assert_eq!("mongo".parse::<StorageBackend>(), Ok(StorageBackend::Mongo));
        assert_eq!(" Memory ".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("redis".parse::<StorageBackend>().is_err());
        assert_eq!(StorageBackend::Memory.as_str(), "memory");
    }
}
