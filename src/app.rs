use crate::cli::{Cli, OutputFormat};
use crate::email_content::{parse_message, ParseOptions, ParsedMessage};
use crate::error::{MessageError, ParseError, Result};
use crate::gmail_api::auth::{
    authorize, AuthCodeProvider, FixedCodeProvider, OAuthConfig, StdinCodeProvider,
    GMAIL_READONLY_SCOPE,
};
use crate::gmail_api::messages::{GmailClient, MailClient};
use crate::gmail_api::token_store::TokenStore;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum FailurePolicy {
    /// Stop at the first message that fails to fetch or parse.
    #[default]
    Abort,
    /// Log the failure and move on to the next message.
    Continue,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub user_id: String,
    pub query: String,
    pub parse: ParseOptions,
    pub on_failure: FailurePolicy,
    pub format: OutputFormat,
}

impl RunSettings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            user_id: cli.user.clone(),
            query: cli.query.clone(),
            parse: ParseOptions {
                include_plain: cli.plain,
            },
            on_failure: if cli.keep_going {
                FailurePolicy::Continue
            } else {
                FailurePolicy::Abort
            },
            format: cli.format,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub printed: usize,
    pub failed: Vec<MessageError>,
}

/// Loads credentials, obtains a token and builds the API client.
pub async fn initialize_client(cli: &Cli) -> Result<GmailClient> {
    let config =
        OAuthConfig::from_file(&cli.credentials, vec![GMAIL_READONLY_SCOPE.to_string()]).await?;
    let store = TokenStore::new(&cli.token);

    let provider: Box<dyn AuthCodeProvider> = match &cli.auth_code {
        Some(code) => Box::new(FixedCodeProvider(code.clone())),
        None => Box::new(StdinCodeProvider),
    };
    let token = authorize(&config, &store, provider.as_ref()).await?;

    Ok(GmailClient::new(reqwest::Client::new(), token.access_token))
}

fn write_message<W: Write>(
    out: &mut W,
    message: &ParsedMessage,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", message)?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, message).map_err(std::io::Error::from)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

async fn fetch_and_parse<C: MailClient + ?Sized>(
    client: &C,
    settings: &RunSettings,
    id: &str,
) -> std::result::Result<ParsedMessage, MessageError> {
    let tag = |source: ParseError| MessageError {
        id: id.to_string(),
        source,
    };
    let envelope = client
        .get_message(&settings.user_id, id)
        .await
        .map_err(|e| tag(e.into()))?;
    parse_message(client, &envelope, &settings.user_id, settings.parse)
        .await
        .map_err(tag)
}

/// Lists messages matching the query, then fetches, parses and prints each
/// one in list order.
pub async fn process_messages<C, W>(
    client: &C,
    settings: &RunSettings,
    out: &mut W,
) -> Result<RunReport>
where
    C: MailClient + ?Sized,
    W: Write,
{
    let ids = client
        .list_messages(&settings.user_id, &settings.query)
        .await?;
    tracing::info!(count = ids.len(), query = %settings.query, "Listed messages");

    let mut report = RunReport::default();
    for id in &ids {
        match fetch_and_parse(client, settings, id).await {
            Ok(message) => {
                write_message(out, &message, settings.format)?;
                report.printed += 1;
            }
            Err(e) if settings.on_failure == FailurePolicy::Continue => {
                tracing::warn!("Skipping {}", e);
                report.failed.push(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(report)
}
