use crate::cli::{
    actions::Action, commands, dispatch::handler, globals::GlobalArgs, telemetry,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Start the CLI
///
/// # Errors
/// Returns an error if telemetry setup or argument handling fails.
pub fn start() -> Result<(Action, GlobalArgs)> {
    let matches = commands::new().get_matches();

    let verbosity_level = match matches.get_one::<u8>("verbosity").map_or(0, |&v| v) {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    telemetry::init(Some(verbosity_level))?;

    let endpoint = matches
        .get_one::<String>("shortener-endpoint")
        .cloned()
        .context("missing shortener endpoint")?;
    let mut globals = GlobalArgs::new(endpoint);

    let api_key = matches
        .get_one::<String>("shortener-api-key")
        .cloned()
        .context("missing required argument: --shortener-api-key")?;
    globals.set_api_key(SecretString::from(api_key));

    let action = handler(&matches)?;

    Ok((action, globals))
}
