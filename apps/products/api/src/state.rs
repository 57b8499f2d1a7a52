//! Application state management

use database::postgres::DatabaseConnection;
use domain_products::InMemoryProductRepository;

/// Where products live for this process
#[derive(Clone)]
pub enum Backend {
    Postgres(DatabaseConnection),
    Memory(InMemoryProductRepository),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub backend: Backend,
}

impl AppState {
    pub fn db(&self) -> Option<&DatabaseConnection> {
        match &self.backend {
            Backend::Postgres(db) => Some(db),
            Backend::Memory(_) => None,
        }
    }
}
