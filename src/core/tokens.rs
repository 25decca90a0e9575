//! Proof token store: issue, single-use consume, sweep
//!
//! Per token: ALIVE → CONSUMED (consume before expiry)
//!            ALIVE → EXPIRED  (now ≥ expires_at)
//!            CONSUMED | EXPIRED → ABSENT (cleanup)
//!
//! The map is striped over independent mutexes so operations on different
//! tokens rarely contend. Check-and-set of `used` happens under the shard
//! lock, so racing consumers of one token see exactly one `true`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::ConfigError;
use crate::types::{TokenRecord, TokenState};
use crate::{
    MAX_TOKEN_SHARDS, MAX_TOKEN_TTL_SECS, TOKEN_BYTES, TOKEN_SHARDS, TOKEN_SWEEP_INTERVAL_SECS,
    TOKEN_TTL_SECS,
};

/// Token store settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Seconds a token stays redeemable
    pub ttl_secs: i64,
    /// Number of lock stripes
    pub shards: usize,
    /// Background sweep period; 0 disables the sweeper
    pub sweep_interval_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_secs: TOKEN_TTL_SECS,
            shards: TOKEN_SHARDS,
            sweep_interval_secs: TOKEN_SWEEP_INTERVAL_SECS,
        }
    }
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&self.ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "tokens.ttl_secs must be within 1..={MAX_TOKEN_TTL_SECS}, got {}",
                self.ttl_secs
            )));
        }
        if !(1..=MAX_TOKEN_SHARDS).contains(&self.shards) {
            return Err(ConfigError::Invalid(format!(
                "tokens.shards must be within 1..={MAX_TOKEN_SHARDS}, got {}",
                self.shards
            )));
        }
        Ok(())
    }
}

type Shard = HashMap<String, TokenRecord>;

/// In-memory, process-local token store
#[derive(Debug)]
pub struct TokenStore {
    shards: Box<[Mutex<Shard>]>,
    ttl: Duration,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(TokenConfig::default())
    }
}

impl TokenStore {
    /// Create an empty store.
    ///
    /// Out-of-range settings are clamped into the ranges `TokenConfig::validate`
    /// accepts, so an unvalidated config cannot make the store panic.
    pub fn new(config: TokenConfig) -> Self {
        let shard_count = config.shards.clamp(1, MAX_TOKEN_SHARDS);
        let ttl_secs = config.ttl_secs.clamp(1, MAX_TOKEN_TTL_SECS);
        if shard_count != config.shards || ttl_secs != config.ttl_secs {
            tracing::warn!(
                shards = config.shards,
                ttl_secs = config.ttl_secs,
                "token settings out of range; clamped to {shard_count} shards, {ttl_secs}s ttl"
            );
        }
        let shards = (0..shard_count)
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let ttl = Duration::try_seconds(ttl_secs)
            .unwrap_or_else(|| Duration::seconds(TOKEN_TTL_SECS));
        Self { shards, ttl }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh token valid until `now + ttl`
    pub fn issue(&self, now: DateTime<Utc>) -> String {
        let token = generate_token();
        // saturates rather than overflowing near the end of the calendar
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let record = TokenRecord::new(expires_at);
        self.shard(&token).insert(token.clone(), record);
        tracing::debug!(token = %fingerprint(&token), expires_at = %record.expires_at, "token issued");
        token
    }

    /// Redeem a token. True at most once per token, and only before expiry.
    ///
    /// An expired record met here is evicted.
    pub fn consume(&self, token: &str, now: DateTime<Utc>) -> bool {
        let mut shard = self.shard(token);
        let Some(record) = shard.get_mut(token) else {
            return false;
        };
        if record.used {
            return false;
        }
        if record.is_expired(now) {
            shard.remove(token);
            return false;
        }
        record.used = true;
        true
    }

    /// Drop every expired or used record; returns how many were removed
    pub fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut shard = lock(shard);
            let before = shard.len();
            shard.retain(|_, record| !record.is_collectable(now));
            removed += before - shard.len();
        }
        if removed > 0 {
            tracing::trace!(removed, "token sweep");
        }
        removed
    }

    /// Lifecycle state, without changing anything
    pub fn state(&self, token: &str, now: DateTime<Utc>) -> TokenState {
        self.shard(token)
            .get(token)
            .map(|record| record.state(now))
            .unwrap_or(TokenState::Absent)
    }

    /// Records currently held (any state)
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| lock(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(&self, token: &str) -> MutexGuard<'_, Shard> {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let idx = (hasher.finish() % self.shards.len() as u64) as usize;
        lock(&self.shards[idx])
    }
}

/// A panic while holding a shard cannot leave a half-written record,
/// so a poisoned lock is still usable.
fn lock(shard: &Mutex<Shard>) -> MutexGuard<'_, Shard> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 192 bits from the OS CSPRNG, URL-safe base64
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Short SHA-256 prefix for logs; the token itself is never logged
pub fn fingerprint(token: &str) -> String {
    let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// TESTS
// =============================================================================
