//! Redirect guard: a short-lived marker binding a session to the token it
//! just routed through the external shortener.
//!
//! Without the guard, anyone who learns a valid token value could open the
//! display step directly and skip the shortener hop entirely. A guard entry
//! only needs to survive one shortener round-trip, so its TTL is minutes,
//! not hours.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::lock;

/// Lifetime of a guard entry.
pub const GUARD_TTL_SECONDS: i64 = 2 * 60;

#[derive(Clone, Debug)]
struct GuardEntry {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Per-session guard entries, keyed by the browser-scoped session identity.
pub trait GuardStore: Send + Sync {
    /// Bind `token` to `session_id`, overwriting any prior entry for that
    /// session.
    fn set(&self, session_id: &str, token: &str);

    /// True iff an unexpired entry exists for `session_id` and it holds
    /// exactly `token`. The entry is deleted on success (strict single use);
    /// failed checks leave state untouched.
    fn check_and_consume(&self, session_id: &str, token: &str) -> bool;
}

/// In-memory guard store with a configurable TTL.
#[derive(Debug)]
pub struct MemoryGuardStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, GuardEntry>>,
}

impl MemoryGuardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(GUARD_TTL_SECONDS))
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryGuardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardStore for MemoryGuardStore {
    fn set(&self, session_id: &str, token: &str) {
        let entry = GuardEntry {
            token: token.to_string(),
            expires_at: Utc::now() + self.ttl,
        };
        lock(&self.entries).insert(session_id.to_string(), entry);
    }

    fn check_and_consume(&self, session_id: &str, token: &str) -> bool {
        let mut entries = lock(&self.entries);
        // Denial reasons are logged but never surfaced to the caller.
        let Some(entry) = entries.get(session_id) else {
            debug!("redirect guard missing for session");
            return false;
        };
        if Utc::now() > entry.expires_at {
            debug!("redirect guard expired");
            return false;
        }
        if entry.token != token {
            debug!("redirect guard token mismatch");
            return false;
        }
        entries.remove(session_id);
        true
    }
}
