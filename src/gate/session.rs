//! Session manager: long-lived "verified" grants established by successful
//! token redemption.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::lock;

#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub verified: bool,
    pub expires_at: DateTime<Utc>,
}

/// Verified-session grants, keyed by session identity.
pub trait SessionStore: Send + Sync {
    /// Mark the session verified until `now + ttl`, overwriting any prior
    /// grant.
    fn establish(&self, session_id: &str, ttl: Duration);

    /// A session is verified iff a grant exists, is flagged verified, and is
    /// unexpired. Expiry is lazy: an expired grant reads as never-verified
    /// and the stale record is dropped on that read.
    fn is_verified(&self, session_id: &str) -> bool;
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expiry of the current grant, if any. Mainly useful for audits and
    /// tests; does not self-heal.
    #[must_use]
    pub fn grant_expiry(&self, session_id: &str) -> Option<DateTime<Utc>> {
        lock(&self.records)
            .get(session_id)
            .map(|record| record.expires_at)
    }
}

impl SessionStore for MemorySessionStore {
    fn establish(&self, session_id: &str, ttl: Duration) {
        let record = SessionRecord {
            verified: true,
            expires_at: Utc::now() + ttl,
        };
        lock(&self.records).insert(session_id.to_string(), record);
        debug!("session verified");
    }

    fn is_verified(&self, session_id: &str) -> bool {
        let mut records = lock(&self.records);
        let Some(record) = records.get(session_id) else {
            return false;
        };
        if Utc::now() > record.expires_at {
            records.remove(session_id);
            return false;
        }
        record.verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sessions_are_not_verified() {
        let store = MemorySessionStore::new();
        assert!(!store.is_verified("sess-1"));
    }

    #[test]
    fn established_sessions_are_verified_until_expiry() {
        let store = MemorySessionStore::new();
        store.establish("sess-1", Duration::hours(24));
        assert!(store.is_verified("sess-1"));
        assert!(!store.is_verified("sess-2"));
    }

    #[test]
    fn expired_grants_read_as_never_verified_and_self_heal() {
        let store = MemorySessionStore::new();
        store.establish("sess-1", Duration::seconds(-1));

        assert!(!store.is_verified("sess-1"));
        // The stale record was dropped by the read.
        assert!(store.grant_expiry("sess-1").is_none());
    }

    #[test]
    fn establish_overwrites_the_previous_grant() {
        let store = MemorySessionStore::new();
        store.establish("sess-1", Duration::seconds(-1));
        store.establish("sess-1", Duration::hours(1));
        assert!(store.is_verified("sess-1"));
    }
}
