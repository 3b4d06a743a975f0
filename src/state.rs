use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::errors::AppError;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.jwt_ttl_hours);
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            tokens,
        }
    }

    /// Locks the shared connection. Hold the guard for one service call only,
    /// never across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database mutex poisoned")))
    }
}
