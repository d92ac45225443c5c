//! Verification flow controller.
//!
//! Orchestrates one flow attempt end to end: issue a token, obtain the
//! external short link, arm the redirect guard, and later gate the display
//! step and redeem the token into a verified session.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::guard::GuardStore;
use super::session::SessionStore;
use super::store::TokenStore;
use super::token::{self, RedeemError};
use crate::shortener::{Shorten, ShortenerUnavailable};

/// Progress of a flow attempt, traced per stage transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowStage {
    Idle,
    Started,
    AwaitingExternalRedirect,
    GuardChecked,
    TokenRevealed,
    Redeemed,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::AwaitingExternalRedirect => "awaiting-external-redirect",
            Self::GuardChecked => "guard-checked",
            Self::TokenRevealed => "token-revealed",
            Self::Redeemed => "redeemed",
        };
        write!(f, "{name}")
    }
}

/// Why a flow could not be started.
#[derive(Debug)]
pub enum StartError {
    /// All shortener attempts failed; the human has to re-trigger the flow.
    ShortenerUnavailable,
    /// Token issuance failed (randomness source or exhausted collision
    /// retries).
    Issuance(anyhow::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortenerUnavailable => {
                write!(f, "The URL shortener is currently unavailable. Please try again.")
            }
            Self::Issuance(err) => write!(f, "Failed to issue a token: {err}"),
        }
    }
}

impl std::error::Error for StartError {}

impl From<ShortenerUnavailable> for StartError {
    fn from(_: ShortenerUnavailable) -> Self {
        Self::ShortenerUnavailable
    }
}

/// Result of a successfully started flow.
#[derive(Clone, Debug)]
pub struct StartOutcome {
    pub token: String,
    pub short_url: String,
}

/// The flow controller. Stores and the shortener are injected seams; the
/// in-memory store implementations satisfy them in production.
pub struct VerificationFlow {
    tokens: Arc<dyn TokenStore>,
    guards: Arc<dyn GuardStore>,
    sessions: Arc<dyn SessionStore>,
    shortener: Arc<dyn Shorten>,
    public_url: String,
}

impl VerificationFlow {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        guards: Arc<dyn GuardStore>,
        sessions: Arc<dyn SessionStore>,
        shortener: Arc<dyn Shorten>,
        public_url: String,
    ) -> Self {
        Self {
            tokens,
            guards,
            sessions,
            shortener,
            public_url,
        }
    }

    /// Start a flow for `session_id`: issue a token, shorten the destination
    /// URL, then arm the redirect guard.
    ///
    /// The guard is only set after the shortener round-trip succeeds, so a
    /// failed start leaves no guard entry behind. No store lock is held while
    /// the shortener call is in flight.
    ///
    /// # Errors
    /// [`StartError::ShortenerUnavailable`] once the retry budget is spent,
    /// or [`StartError::Issuance`] if no token could be minted.
    #[instrument(skip(self))]
    pub async fn start(&self, session_id: &str) -> Result<StartOutcome, StartError> {
        debug!(stage = %FlowStage::Idle, "starting verification flow");

        let record = token::issue(self.tokens.as_ref(), session_id).map_err(StartError::Issuance)?;
        debug!(stage = %FlowStage::Started, "token issued");

        let destination = build_destination_url(&self.public_url, &record.token);
        let alias = redirect_alias();
        let short_url = self.shortener.shorten(&destination, Some(&alias)).await?;

        self.guards.set(session_id, &record.token);
        debug!(stage = %FlowStage::AwaitingExternalRedirect, "redirect guard armed");

        Ok(StartOutcome {
            token: record.token,
            short_url,
        })
    }

    /// Anti-bypass gate for the token display step.
    ///
    /// True only when the session passed through the redirect chain for this
    /// exact token within the guard TTL; consumes the guard entry so the
    /// display step cannot be replayed.
    #[instrument(skip(self, token))]
    pub fn validate_display_access(&self, session_id: &str, token: &str) -> bool {
        if self.guards.check_and_consume(session_id, token) {
            debug!(stage = %FlowStage::GuardChecked, "display access granted");
            debug!(stage = %FlowStage::TokenRevealed, "token revealed to session");
            true
        } else {
            info!("display access denied");
            false
        }
    }

    /// Redeem `token` for `session_id` and establish the verified session.
    ///
    /// The grant TTL is the remaining token validity window, so a grant never
    /// outlives the token it came from.
    ///
    /// # Errors
    /// [`RedeemError`] describing why the redemption was refused; no state is
    /// changed on failure.
    #[instrument(skip(self, token))]
    pub fn redeem(&self, session_id: &str, token: &str) -> Result<(), RedeemError> {
        let now = Utc::now();
        let record = self.tokens.redeem(token, now)?;

        self.sessions
            .establish(session_id, record.remaining_validity(now));
        debug!(stage = %FlowStage::Redeemed, "token redeemed, session established");

        Ok(())
    }

    /// Whether `session_id` currently holds an unexpired verified grant.
    #[must_use]
    pub fn is_verified(&self, session_id: &str) -> bool {
        self.sessions.is_verified(session_id)
    }
}

fn build_destination_url(public_url: &str, token: &str) -> String {
    let base = public_url.trim_end_matches('/');
    format!("{base}/?view=display&token={token}")
}

fn redirect_alias() -> String {
    format!("v-{:08x}", rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::guard::MemoryGuardStore;
    use crate::gate::session::MemorySessionStore;
    use crate::gate::store::MemoryTokenStore;
    use crate::gate::token::{TokenRecord, TOKEN_TTL_SECONDS};
    use chrono::{Duration, Utc};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticShortener {
        calls: AtomicU32,
        fail: bool,
    }

    impl StaticShortener {
        fn succeeding() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: true,
            }
        }
    }

    impl Shorten for StaticShortener {
        fn shorten<'a>(
            &'a self,
            _destination: &'a str,
            _alias: Option<&'a str>,
        ) -> Pin<Box<dyn Future<Output = Result<String, ShortenerUnavailable>> + Send + 'a>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(ShortenerUnavailable)
                } else {
                    Ok("https://short.example/abc".to_string())
                }
            })
        }
    }

    struct Fixture {
        tokens: Arc<MemoryTokenStore>,
        guards: Arc<MemoryGuardStore>,
        sessions: Arc<MemorySessionStore>,
        flow: VerificationFlow,
    }

    fn fixture(shortener: StaticShortener) -> Fixture {
        let tokens = Arc::new(MemoryTokenStore::new());
        let guards = Arc::new(MemoryGuardStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let flow = VerificationFlow::new(
            Arc::clone(&tokens) as Arc<dyn crate::gate::store::TokenStore>,
            Arc::clone(&guards) as Arc<dyn GuardStore>,
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            Arc::new(shortener),
            "https://gate.example.com/".to_string(),
        );
        Fixture {
            tokens,
            guards,
            sessions,
            flow,
        }
    }

    #[tokio::test]
    async fn start_issues_token_and_arms_guard() {
        let fx = fixture(StaticShortener::succeeding());

        let outcome = fx.flow.start("sess-1").await.expect("start");
        assert_eq!(outcome.short_url, "https://short.example/abc");

        let record = fx.tokens.get(&outcome.token).expect("stored token");
        assert_eq!(record.owner_session_id, "sess-1");
        assert!(!record.used);

        // Guard is armed for the starting session only.
        assert!(fx.flow.validate_display_access("sess-1", &outcome.token));
    }

    #[tokio::test]
    async fn display_access_is_single_use_and_session_bound() {
        let fx = fixture(StaticShortener::succeeding());
        let outcome = fx.flow.start("sess-1").await.expect("start");

        assert!(fx.flow.validate_display_access("sess-1", &outcome.token));
        // Replay of the display step.
        assert!(!fx.flow.validate_display_access("sess-1", &outcome.token));

        let second = fx.flow.start("sess-1").await.expect("restart");
        // Wrong session never passes.
        assert!(!fx.flow.validate_display_access("sess-2", &second.token));
    }

    #[tokio::test]
    async fn redeem_establishes_a_day_long_grant() {
        let fx = fixture(StaticShortener::succeeding());
        let outcome = fx.flow.start("sess-1").await.expect("start");

        fx.flow.redeem("sess-1", &outcome.token).expect("redeem");
        assert!(fx.flow.is_verified("sess-1"));

        let expiry = fx.sessions.grant_expiry("sess-1").expect("grant expiry");
        let expected = Utc::now() + Duration::seconds(TOKEN_TTL_SECONDS);
        let drift = (expected - expiry).num_seconds().abs();
        assert!(drift <= 5, "grant expiry drifted by {drift}s");
    }

    #[tokio::test]
    async fn redeem_is_single_use() {
        let fx = fixture(StaticShortener::succeeding());
        let outcome = fx.flow.start("sess-1").await.expect("start");

        fx.flow.redeem("sess-1", &outcome.token).expect("redeem");
        assert_eq!(
            fx.flow.redeem("sess-1", &outcome.token),
            Err(RedeemError::AlreadyUsed)
        );
    }

    #[tokio::test]
    async fn redeem_rejects_expired_tokens_without_granting() {
        let fx = fixture(StaticShortener::succeeding());

        let now = Utc::now();
        let mut record = TokenRecord::new(
            "VX-AAAAA-BBBBB-CCCC".to_string(),
            "sess-1".to_string(),
            now,
        );
        record.created_at = now - Duration::seconds(TOKEN_TTL_SECONDS + 1);
        record.expires_at = now - Duration::seconds(1);
        assert!(fx.tokens.insert(record));

        assert_eq!(
            fx.flow.redeem("sess-1", "VX-AAAAA-BBBBB-CCCC"),
            Err(RedeemError::Expired)
        );
        assert!(!fx.flow.is_verified("sess-1"));
    }

    #[tokio::test]
    async fn redeem_rejects_unknown_tokens() {
        let fx = fixture(StaticShortener::succeeding());
        assert_eq!(
            fx.flow.redeem("sess-1", "VX-AAAAA-BBBBB-CCCC"),
            Err(RedeemError::NotFound)
        );
    }

    #[tokio::test]
    async fn failed_start_leaves_no_guard_behind() {
        let fx = fixture(StaticShortener::failing());

        let err = fx.flow.start("sess-1").await.expect_err("shortener down");
        assert!(matches!(err, StartError::ShortenerUnavailable));

        // No token value is known to the caller, but no guard entry may exist
        // for the session either.
        assert!(!fx.guards.check_and_consume("sess-1", "VX-AAAAA-BBBBB-CCCC"));
    }

    #[test]
    fn destination_url_embeds_the_token() {
        let url = build_destination_url("https://gate.example.com/", "VX-AAAAA-BBBBB-CCCC");
        assert_eq!(
            url,
            "https://gate.example.com/?view=display&token=VX-AAAAA-BBBBB-CCCC"
        );
    }

    #[test]
    fn redirect_aliases_are_short_and_prefixed() {
        let alias = redirect_alias();
        assert!(alias.starts_with("v-"));
        assert_eq!(alias.len(), 10);
    }
}
