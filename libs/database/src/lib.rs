//! Database connectivity for the products service.
//!
//! # Features
//!
//! - `postgres` (default): PostgreSQL through SeaORM, migrations runner, health checks
//! - `config` (default): `core_config::FromEnv` for [`postgres::PostgresConfig`]
//!
//! ```ignore
//! use database::{common::RetryConfig, postgres};
//! use migration::Migrator;
//!
//! let config = postgres::PostgresConfig::from_env()?;
//! let db = postgres::connect_with_retry(config, &RetryConfig::default()).await?;
//! postgres::run_migrations::<Migrator>(&db, "products_api").await?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult};
