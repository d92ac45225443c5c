use crate::api;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;
use tracing::debug;
use url::Url;

/// Handle the server action.
///
/// # Errors
/// Returns an error if the public URL is invalid or the server fails to
/// start.
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, public_url } => {
            // Validated up front so a bad URL fails at startup, not mid-flow.
            let public_url = Url::parse(&public_url)?;

            debug!("public url: {public_url}");

            api::new(port, public_url.as_str(), globals).await?;
        }
    }

    Ok(())
}
