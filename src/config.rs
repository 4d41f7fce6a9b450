//! Server configuration.

use thiserror::Error;

use crate::digest::AlgorithmFamily;

/// Default shared secret both digest families ship with. Real deployments
/// override this per family via configuration.
pub const DEFAULT_DIGEST_KEY: &str = "CustomServerDigest";

/// Default game port.
const DEFAULT_GAME_PORT: u16 = 10061;

/// Default cap on level uploads per user per rolling day.
const DEFAULT_MAX_DAILY_LEVEL_UPLOADS: usize = 20;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub port: u16,
    /// Ordered secrets for the plain (SHA-1) digest family; index 0 is the
    /// fallback key.
    pub sha1_digest_keys: Vec<String>,
    /// Ordered secrets for the keyed (HMAC-SHA1) digest family; index 0 is
    /// the fallback key.
    pub hmac_digest_keys: Vec<String>,
    /// Constant salt mixed into every digest.
    pub digest_salt: String,
    /// Cap on level uploads per user per rolling day.
    pub max_daily_level_uploads: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GAME_PORT,
            sha1_digest_keys: vec![DEFAULT_DIGEST_KEY.to_string()],
            hmac_digest_keys: vec![DEFAULT_DIGEST_KEY.to_string()],
            digest_salt: String::new(),
            max_daily_level_uploads: DEFAULT_MAX_DAILY_LEVEL_UPLOADS,
        }
    }
}

impl GameConfig {
    /// Validate the configuration. A family with no keys cannot sign
    /// responses, so it is refused at boot rather than discovered
    /// per-request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sha1_digest_keys.is_empty() {
            return Err(ConfigError::EmptyKeyList(AlgorithmFamily::Plain));
        }
        if self.hmac_digest_keys.is_empty() {
            return Err(ConfigError::EmptyKeyList(AlgorithmFamily::Keyed));
        }
        Ok(())
    }
}

/// Fatal configuration faults.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no {0} digest keys configured")]
    EmptyKeyList(AlgorithmFamily),
}
