use std::sync::Arc;

use crate::{auth::SessionVerifier, config::Config, database::Database, storage::ObjectStore};

pub mod account;
pub mod files;
pub mod health;
pub mod webhooks;

/// Explicitly constructed server context handed to every handler; no global
/// state lives outside of it.
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub storage: Arc<dyn ObjectStore>,
    pub sessions: SessionVerifier,
    pub config: Config,
}
