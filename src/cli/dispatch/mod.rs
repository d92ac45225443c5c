use crate::cli::actions::Action;
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        public_url: matches
            .get_one::<String>("public-url")
            .cloned()
            .context("missing required argument: --public-url")?,
    })
}
