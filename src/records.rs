//! Plain persisted-record types and their in-memory stores.
//!
//! These records carry no protocol behavior; they exist so the management
//! API has something real to read and write. Stores are concurrent
//! (DashMap) and independent of the digest path.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// How long one upload-counting window lasts.
const UPLOAD_WINDOW_HOURS: i64 = 24;

/// A mapping of playlist -> sub-level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPlaylistRelation {
    /// The playlist the level is contained in.
    pub playlist_id: i32,
    /// The level contained within the playlist.
    pub level_id: i32,
}

/// Rolling count of levels a user uploaded in the current day window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyLevelUploads {
    pub count: i32,
    pub expiry_date: DateTime<Utc>,
}

impl DailyLevelUploads {
    /// Whether the counting window has lapsed.
    pub fn date_is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_date
    }
}

/// Playlist contents, keyed by playlist id. Insertion order is level order.
pub struct PlaylistStore {
    relations: DashMap<i32, Vec<LevelPlaylistRelation>>,
}

impl PlaylistStore {
    pub fn new() -> Self {
        Self {
            relations: DashMap::new(),
        }
    }

    /// Add a level to a playlist. Re-adding an existing pair is a no-op;
    /// returns whether the relation was new.
    pub fn add(&self, playlist_id: i32, level_id: i32) -> bool {
        let mut levels = self.relations.entry(playlist_id).or_default();
        let relation = LevelPlaylistRelation {
            playlist_id,
            level_id,
        };
        if levels.contains(&relation) {
            return false;
        }
        levels.push(relation);
        true
    }

    /// Remove a level from a playlist. Drops the playlist entry when it
    /// empties.
    pub fn remove(&self, playlist_id: i32, level_id: i32) -> bool {
        let Some(mut levels) = self.relations.get_mut(&playlist_id) else {
            return false;
        };
        let before = levels.len();
        levels.retain(|relation| relation.level_id != level_id);
        let removed = levels.len() != before;
        let empty = levels.is_empty();
        drop(levels);

        if empty {
            self.relations.remove(&playlist_id);
        }
        removed
    }

    /// Levels contained in a playlist, in insertion order.
    pub fn levels_in(&self, playlist_id: i32) -> Vec<LevelPlaylistRelation> {
        self.relations
            .get(&playlist_id)
            .map(|levels| levels.value().clone())
            .unwrap_or_default()
    }

    /// Total relations across all playlists.
    pub fn relation_count(&self) -> usize {
        self.relations.iter().map(|entry| entry.value().len()).sum()
    }
}

/// Per-user upload counters, keyed by user id.
pub struct DailyUploadStore {
    uploads: DashMap<i32, DailyLevelUploads>,
}

impl DailyUploadStore {
    pub fn new() -> Self {
        Self {
            uploads: DashMap::new(),
        }
    }

    /// Record one upload for a user and return the count in the current
    /// window. An expired window restarts at 1.
    pub fn record_upload(&self, user_id: i32) -> i32 {
        self.record_upload_at(user_id, Utc::now())
    }

    fn record_upload_at(&self, user_id: i32, now: DateTime<Utc>) -> i32 {
        let mut entry = self
            .uploads
            .entry(user_id)
            .or_insert_with(|| DailyLevelUploads {
                count: 0,
                expiry_date: now + Duration::hours(UPLOAD_WINDOW_HOURS),
            });
        if entry.date_is_expired(now) {
            entry.count = 0;
            entry.expiry_date = now + Duration::hours(UPLOAD_WINDOW_HOURS);
        }
        entry.count += 1;
        entry.count
    }

    /// Current-window record for a user, if one is active.
    pub fn get(&self, user_id: i32) -> Option<DailyLevelUploads> {
        self.get_at(user_id, Utc::now())
    }

    fn get_at(&self, user_id: i32, now: DateTime<Utc>) -> Option<DailyLevelUploads> {
        self.uploads
            .get(&user_id)
            .filter(|uploads| !uploads.date_is_expired(now))
            .map(|uploads| uploads.value().clone())
    }

    /// Current-window count for a user. Zero when untracked or expired.
    pub fn current_count(&self, user_id: i32) -> i32 {
        self.get(user_id).map(|uploads| uploads.count).unwrap_or(0)
    }

    /// Number of users with a tracked counter (expired or not).
    pub fn tracked_users(&self) -> usize {
        self.uploads.len()
    }

    /// Drop expired counters. Called periodically by the cleanup task.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.uploads
            .retain(|_, uploads| !uploads.date_is_expired(now));
    }
}
