use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

/// Default vplink-style shortening endpoint.
pub const DEFAULT_SHORTENER_ENDPOINT: &str = "https://vplink.in/api";

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("tollgate")
        .about("Single-use token verification gate")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TOLLGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("public-url")
                .short('u')
                .long("public-url")
                .help("Public base URL of the token display page, embedded in the destination link handed to the shortener")
                .env("TOLLGATE_PUBLIC_URL")
                .required(true),
        )
        .arg(
            Arg::new("shortener-endpoint")
                .long("shortener-endpoint")
                .help("URL shortening provider API endpoint")
                .default_value(DEFAULT_SHORTENER_ENDPOINT)
                .env("TOLLGATE_SHORTENER_ENDPOINT"),
        )
        .arg(
            Arg::new("shortener-api-key")
                .long("shortener-api-key")
                .help("API key for the URL shortening provider")
                .env("TOLLGATE_SHORTENER_API_KEY")
                .required(true),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("TOLLGATE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
