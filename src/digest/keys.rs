//! Shared-secret storage for the two digest families.
//!
//! Each family owns an ordered key list; list position is matching priority
//! and position 0 is the fallback key. Lists are rotated at runtime by
//! swapping a whole `Arc<Vec<_>>`, so a request that took a snapshot keeps
//! searching one consistent list no matter how many rotations land mid-flight.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{ConfigError, GameConfig};

use super::compute::AlgorithmFamily;

/// Rotating shared secrets for both digest families.
pub struct KeyStore {
    sha1_keys: RwLock<Arc<Vec<String>>>,
    hmac_keys: RwLock<Arc<Vec<String>>>,
}

impl KeyStore {
    /// Build a key store from a validated configuration.
    pub fn from_config(config: &GameConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.sha1_digest_keys.clone(),
            config.hmac_digest_keys.clone(),
        )
    }

    /// Build a key store from two ordered key lists. An empty list for
    /// either family is a configuration fault, refused here so it can never
    /// surface per-request.
    pub fn new(sha1_keys: Vec<String>, hmac_keys: Vec<String>) -> Result<Self, ConfigError> {
        if sha1_keys.is_empty() {
            return Err(ConfigError::EmptyKeyList(AlgorithmFamily::Plain));
        }
        if hmac_keys.is_empty() {
            return Err(ConfigError::EmptyKeyList(AlgorithmFamily::Keyed));
        }
        Ok(Self {
            sha1_keys: RwLock::new(Arc::new(sha1_keys)),
            hmac_keys: RwLock::new(Arc::new(hmac_keys)),
        })
    }

    fn slot(&self, family: AlgorithmFamily) -> &RwLock<Arc<Vec<String>>> {
        match family {
            AlgorithmFamily::Plain => &self.sha1_keys,
            AlgorithmFamily::Keyed => &self.hmac_keys,
        }
    }

    /// Snapshot of a family's key list. The returned list is immutable; a
    /// concurrent rotation swaps in a new list and never touches this one.
    pub fn snapshot(&self, family: AlgorithmFamily) -> Arc<Vec<String>> {
        self.slot(family).read().clone()
    }

    /// The key every unmatched request is signed with: list position 0.
    pub fn fallback_key(&self, family: AlgorithmFamily) -> String {
        // Lists are non-empty by construction.
        self.snapshot(family)[0].clone()
    }

    /// Replace a family's key list wholesale. Rotating to an empty list is
    /// refused, same as at boot.
    pub fn replace_keys(
        &self,
        family: AlgorithmFamily,
        keys: Vec<String>,
    ) -> Result<(), ConfigError> {
        if keys.is_empty() {
            return Err(ConfigError::EmptyKeyList(family));
        }
        *self.slot(family).write() = Arc::new(keys);
        Ok(())
    }

    /// Append a key at the lowest matching priority (end of list).
    pub fn append_key(&self, family: AlgorithmFamily, key: String) {
        let slot = self.slot(family);
        let mut guard = slot.write();
        let mut next = guard.as_ref().clone();
        next.push(key);
        *guard = Arc::new(next);
    }

    /// Number of keys configured for a family.
    pub fn key_count(&self, family: AlgorithmFamily) -> usize {
        self.snapshot(family).len()
    }
}
