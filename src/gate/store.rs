//! Token store abstraction and the in-memory implementation.
//!
//! The store is injected into the flow controller so the atomicity contract
//! of `redeem` is explicit and testable rather than an accident of the
//! process model.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use super::token::{RedeemError, TokenRecord};

/// Persistent mapping of token value → record.
pub trait TokenStore: Send + Sync {
    /// Persist a freshly issued record. Returns false when a record with the
    /// same token value already exists; the caller retries with new
    /// randomness.
    fn insert(&self, record: TokenRecord) -> bool;

    /// Look up a record without mutating it.
    fn get(&self, token: &str) -> Option<TokenRecord>;

    /// Atomic check-and-set redemption.
    ///
    /// Checks run in a fixed order: unknown token, expiry (which wins over
    /// `used`), then single-use. The false→true flip of `used` happens in the
    /// same critical section as the checks, so concurrent redemptions of one
    /// token yield exactly one `Ok`.
    ///
    /// # Errors
    /// [`RedeemError::NotFound`], [`RedeemError::Expired`], or
    /// [`RedeemError::AlreadyUsed`].
    fn redeem(&self, token: &str, now: DateTime<Utc>) -> Result<TokenRecord, RedeemError>;
}

/// In-memory token store; TTL expiry is evaluated lazily on redemption.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: Mutex<HashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn insert(&self, record: TokenRecord) -> bool {
        let mut records = lock(&self.records);
        if records.contains_key(&record.token) {
            return false;
        }
        records.insert(record.token.clone(), record);
        true
    }

    fn get(&self, token: &str) -> Option<TokenRecord> {
        lock(&self.records).get(token).cloned()
    }

    fn redeem(&self, token: &str, now: DateTime<Utc>) -> Result<TokenRecord, RedeemError> {
        let mut records = lock(&self.records);
        let record = records.get_mut(token).ok_or(RedeemError::NotFound)?;
        if now > record.expires_at {
            return Err(RedeemError::Expired);
        }
        if record.used {
            return Err(RedeemError::AlreadyUsed);
        }
        record.used = true;
        Ok(record.clone())
    }
}
