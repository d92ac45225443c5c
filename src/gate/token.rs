//! Access token format, issuance, and redemption errors.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use std::fmt;

use super::store::TokenStore;

/// Lifetime of an issued token.
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Prefix carried by every issued token.
pub const TOKEN_PREFIX: &str = "VX";

// 32 symbols; visually ambiguous characters (I, O, 0, 1) are excluded.
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// Rendered as VX-XXXXX-XXXXX-XXXX.
const TOKEN_SEGMENTS: [usize; 3] = [5, 5, 4];

const MAX_ISSUE_ATTEMPTS: usize = 5;

/// A single-use access credential.
///
/// Immutable once stored, apart from the one false→true flip of `used`
/// performed by [`TokenStore::redeem`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub owner_session_id: String,
}

impl TokenRecord {
    #[must_use]
    pub fn new(token: String, owner_session_id: String, now: DateTime<Utc>) -> Self {
        Self {
            token,
            created_at: now,
            expires_at: now + Duration::seconds(TOKEN_TTL_SECONDS),
            used: false,
            owner_session_id,
        }
    }

    /// Validity left on the token at `now`; zero or negative means expired.
    #[must_use]
    pub fn remaining_validity(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

/// Why a redemption attempt was refused. Terminal for the attempt; a token
/// rejected as expired stays rejected forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedeemError {
    NotFound,
    AlreadyUsed,
    Expired,
}

impl fmt::Display for RedeemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Token not found."),
            Self::AlreadyUsed => write!(f, "Token already used."),
            Self::Expired => write!(f, "Token expired."),
        }
    }
}

impl std::error::Error for RedeemError {}

/// Generate a fresh token value from the OS CSPRNG.
///
/// 14 symbols out of a 32-character alphabet; the byte-to-symbol mapping is
/// unbiased because 256 is a multiple of the alphabet size.
///
/// # Errors
/// Returns an error if the randomness source fails.
pub fn generate_token() -> Result<String> {
    let len: usize = TOKEN_SEGMENTS.iter().sum();
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token randomness")?;

    let mut out = String::with_capacity(TOKEN_PREFIX.len() + len + TOKEN_SEGMENTS.len());
    out.push_str(TOKEN_PREFIX);
    let mut symbols = bytes.into_iter();
    for segment in TOKEN_SEGMENTS {
        out.push('-');
        for _ in 0..segment {
            let byte = symbols
                .next()
                .ok_or_else(|| anyhow!("token randomness exhausted"))?;
            out.push(TOKEN_ALPHABET[usize::from(byte) % TOKEN_ALPHABET.len()] as char);
        }
    }

    Ok(out)
}

/// Check the canonical `VX-XXXXX-XXXXX-XXXX` shape.
#[must_use]
pub fn valid_format(token: &str) -> bool {
    Regex::new(r"^VX-[A-HJ-NP-Z2-9]{5}-[A-HJ-NP-Z2-9]{5}-[A-HJ-NP-Z2-9]{4}$")
        .is_ok_and(|regex| regex.is_match(token))
}

/// Issue a new token owned by `owner_session_id` and persist it.
///
/// Collisions are retried with fresh randomness a bounded number of times.
///
/// # Errors
/// Returns an error if the randomness source fails or the store keeps
/// reporting collisions.
pub fn issue(store: &dyn TokenStore, owner_session_id: &str) -> Result<TokenRecord> {
    for _ in 0..MAX_ISSUE_ATTEMPTS {
        let token = generate_token()?;
        let record = TokenRecord::new(token, owner_session_id.to_string(), Utc::now());
        if store.insert(record.clone()) {
            return Ok(record);
        }
    }

    Err(anyhow!(
        "token collision persisted after {MAX_ISSUE_ATTEMPTS} attempts"
    ))
}
