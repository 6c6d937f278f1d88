use crate::gmail_api::token_store::TokenStore;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_QUERY: &str = "label:newsletter after:2021/05/01 from:hi@vimtricks.com";

#[derive(Debug, Clone, Copy, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// OAuth client descriptor downloaded from the Google Cloud console.
    #[clap(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Where the access and refresh tokens are cached between runs.
    #[clap(long, default_value = "token.json")]
    pub token: PathBuf,

    /// Mailbox to read; "me" is the authenticated user.
    #[clap(long, default_value = "me")]
    pub user: String,

    /// Gmail search expression selecting the messages to print.
    #[clap(long, default_value = DEFAULT_QUERY)]
    pub query: String,

    /// Use this authorization code instead of prompting for one.
    #[clap(long)]
    pub auth_code: Option<String>,

    /// Also extract the text/plain body.
    #[clap(long)]
    pub plain: bool,

    /// Report messages that fail to fetch or parse and carry on.
    #[clap(long)]
    pub keep_going: bool,

    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Delete the cached token and exit.
    #[clap(long)]
    pub clear_token: bool,
}

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Log filter from `RUST_LOG`, or warnings only when it is unset or invalid.
pub fn log_filter() -> EnvFilter {
    log_filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

pub fn log_filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub fn handle_token_clear(cli: &Cli) -> Result<(), crate::error::Error> {
    let store = TokenStore::new(&cli.token);
    if store.clear()? {
        println!("Removed cached token {}.", cli.token.display());
    } else {
        println!("No cached token at {}.", cli.token.display());
    }
    Ok(())
}
