pub mod api;
pub mod cirrus;
pub mod config;
pub mod encryption;
pub mod entity;
pub mod error;
pub mod flow;
pub mod jwt;
pub mod notify;
pub mod pkce;
pub mod store;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

/// Long-lived handles shared across the server.
#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
