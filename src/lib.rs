pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod matching;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod socket;
pub mod utils;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use socket::registry::SocketRegistry;

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub sockets: Arc<SocketRegistry>,
}
