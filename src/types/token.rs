//! Proof token records

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Store-side record for one issued token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRecord {
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl TokenRecord {
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self { expires_at, used: false }
    }

    /// Redeemable only strictly before expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Expired or used records may be dropped
    pub fn is_collectable(&self, now: DateTime<Utc>) -> bool {
        self.used || self.is_expired(now)
    }

    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.used {
            TokenState::Consumed
        } else if self.is_expired(now) {
            TokenState::Expired
        } else {
            TokenState::Alive
        }
    }
}

/// Lifecycle state of a token as seen by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Alive,
    Consumed,
    Expired,
    Absent,
}
