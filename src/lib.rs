//! # Tollgate (Single-Use Access Gate)
//!
//! `tollgate` issues single-use, time-limited access tokens and gates a
//! protected display page behind an external link-shortener redirect.
//!
//! ## Verification Flow
//!
//! A visitor starts at `/verify/start`, which issues a fresh token bound to
//! their session cookie and sends them through the shortener. Coming back,
//! the display page calls `/verify/check-access` (a short-lived, single-use
//! redirect guard) before the token is ever revealed, then redeems it at
//! `/verify/token`.
//!
//! - **Single use:** Redemption flips the token atomically; a second attempt
//!   with the same token is rejected.
//! - **Time limited:** Tokens expire 24 hours after issuance; the redirect
//!   guard expires after 2 minutes.
//! - **Session bound:** A successful redemption establishes a verified grant
//!   for the remainder of the token's validity window.
//!
//! ## Anti-Bypass
//!
//! Direct navigation to the display page, replayed guard checks, and guards
//! belonging to another session all fail with the same generic denial, so a
//! probing client learns nothing about which check rejected it.

pub mod api;
pub mod cli;
pub mod gate;
pub mod shortener;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
