//! Configuration for Products API

use core_config::{AppInfo, FromEnv, app_info, env_parse_or, server::ServerConfig};
use database::postgres::PostgresConfig;
use std::fmt;
use std::str::FromStr;

pub use core_config::Environment;

/// Backing store for the product repository
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductStore {
    Postgres,
    /// Process-local map, lost on restart
    Memory,
}

impl FromStr for ProductStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown store '{}', expected 'postgres' or 'memory'",
                other
            )),
        }
    }
}

impl fmt::Display for ProductStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => f.write_str("postgres"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub server: ServerConfig,
    pub environment: Environment,
    pub store: ProductStore,
    /// Present only when `store` is `Postgres`
    pub postgres: Option<PostgresConfig>,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let server = ServerConfig::from_env()?;
        let store = env_parse_or("PRODUCTS_STORE", ProductStore::Postgres)?;

        let postgres = match store {
            ProductStore::Postgres => Some(PostgresConfig::from_env()?),
            ProductStore::Memory => None,
        };

        Ok(Self {
            app: app_info!(),
            server,
            environment,
            store,
            postgres,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_needs_no_database_url() {
        temp_env::with_vars(
            [
                ("PRODUCTS_STORE", Some("memory")),
                ("DATABASE_URL", None),
                ("PORT", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.store, ProductStore::Memory);
                assert!(config.postgres.is_none());
                assert_eq!(config.server.port, 8080);
                assert_eq!(config.app.name, "products_api");
            },
        );
    }

    #[test]
    fn test_postgres_store_is_default_and_requires_url() {
        temp_env::with_vars(
            [("PRODUCTS_STORE", None::<&str>), ("DATABASE_URL", None)],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(err.to_string().contains("DATABASE_URL"));
            },
        );

        temp_env::with_vars(
            [
                ("PRODUCTS_STORE", None),
                ("DATABASE_URL", Some("postgres://localhost/products")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.store, ProductStore::Postgres);
                assert_eq!(
                    config.postgres.unwrap().url(),
                    "postgres://localhost/products"
                );
            },
        );
    }

    #[test]
    fn test_unknown_store_is_rejected() {
        temp_env::with_var("PRODUCTS_STORE", Some("mongo"), || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("PRODUCTS_STORE"));
        });
    }

    #[test]
    fn test_store_parsing() {
        assert_eq!("Memory".parse::<ProductStore>(), Ok(ProductStore::Memory));
        assert_eq!(
            " postgres ".parse::<ProductStore>(),
            Ok(ProductStore::Postgres)
        );
        assert!("".parse::<ProductStore>().is_err());
    }
}
