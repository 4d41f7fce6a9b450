//! Shared server state.

use std::sync::Arc;

use crate::config::{ConfigError, GameConfig};
use crate::digest::KeyStore;
use crate::records::{DailyUploadStore, PlaylistStore};

/// Shared application state, cheap to clone into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Rotating shared secrets for both digest families.
    pub digest_keys: Arc<KeyStore>,
    /// Playlist -> sub-level relations.
    pub playlists: Arc<PlaylistStore>,
    /// Per-user daily level upload counters.
    pub daily_uploads: Arc<DailyUploadStore>,
    /// Server configuration.
    pub config: Arc<GameConfig>,
}

impl AppState {
    /// Build the application state from a configuration, validating it in
    /// the process.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let digest_keys = KeyStore::from_config(&config)?;
        Ok(Self {
            digest_keys: Arc::new(digest_keys),
            playlists: Arc::new(PlaylistStore::new()),
            daily_uploads: Arc::new(DailyUploadStore::new()),
            config: Arc::new(config),
        })
    }
}
