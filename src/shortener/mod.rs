//! Client for the external link-shortening service.
//!
//! The provider is an opaque hop: `GET <endpoint>?api=<key>&url=<dest>` with
//! `format=text` answers a plaintext short link. Any empty, non-2xx, timed
//! out, or non-`http` response counts as a failed attempt.

pub mod retry;

use anyhow::{anyhow, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, future::Future, pin::Pin, time::Duration};
use tracing::{debug, error};
use url::Url;

/// Attempts per shorten call: the initial try plus two retries.
pub const MAX_ATTEMPTS: u32 = 3;

/// Per-attempt timeout for the provider round-trip.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(4);

/// Terminal error once the retry budget is exhausted. Never retried
/// automatically; the caller has to re-trigger the flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShortenerUnavailable;

impl fmt::Display for ShortenerUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "URL shortener unavailable")
    }
}

impl std::error::Error for ShortenerUnavailable {}

/// Shortening seam, injected into the flow controller so tests can stand in
/// for the provider.
pub trait Shorten: Send + Sync {
    fn shorten<'a>(
        &'a self,
        destination: &'a str,
        alias: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ShortenerUnavailable>> + Send + 'a>>;
}

/// Client for a vplink-style shortening endpoint.
#[derive(Clone, Debug)]
pub struct VplinkClient {
    endpoint: Url,
    api_key: SecretString,
    http: Client,
}

impl VplinkClient {
    /// # Errors
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(endpoint: &str, api_key: SecretString) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;

        Ok(Self {
            endpoint,
            api_key,
            http,
        })
    }

    async fn attempt(&self, destination: &str, alias: Option<&str>) -> Result<String> {
        let mut query: Vec<(&str, &str)> =
            vec![("api", self.api_key.expose_secret()), ("url", destination)];
        if let Some(alias) = alias {
            query.push(("alias", alias));
        }
        query.push(("format", "text"));

        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("shortener answered with status {status}"));
        }

        let body = response.text().await?;
        let link = body.trim();
        if link.is_empty() || !link.starts_with("http") {
            return Err(anyhow!("shortener answered with an unusable body"));
        }

        Ok(link.to_string())
    }
}

impl Shorten for VplinkClient {
    fn shorten<'a>(
        &'a self,
        destination: &'a str,
        alias: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<String, ShortenerUnavailable>> + Send + 'a>> {
        Box::pin(async move {
            retry::with_attempts(MAX_ATTEMPTS, |attempt| {
                debug!(attempt, "calling shortener");
                self.attempt(destination, alias)
            })
            .await
            .map_err(|err| {
                error!("Shortener failed after {MAX_ATTEMPTS} attempts: {err:#}");
                ShortenerUnavailable
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> VplinkClient {
        VplinkClient::new(
            "https://shortener.invalid/api",
            SecretString::from("test-key".to_string()),
        )
        .expect("client")
    }

    #[test]
    fn new_rejects_invalid_endpoints() {
        let result = VplinkClient::new("not a url", SecretString::from("key".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn new_accepts_https_endpoints() {
        let built = client();
        assert_eq!(built.endpoint.as_str(), "https://shortener.invalid/api");
    }

    #[tokio::test]
    async fn unreachable_provider_surfaces_unavailable() {
        // `.invalid` never resolves, so all attempts fail at the transport.
        let result = client().shorten("https://example.com/?token=x", Some("v-1")).await;
        assert_eq!(result, Err(ShortenerUnavailable));
    }
}
