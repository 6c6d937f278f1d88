use crate::error::{Error, Result};
use crate::gmail_api::token_store::{Token, TokenStore};
use async_trait::async_trait;
use chrono::Utc;
use oauth2::basic::{BasicClient, BasicTokenResponse, BasicTokenType};
use oauth2::reqwest::async_http_client;
use oauth2::url::Url;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use yup_oauth2::ApplicationSecret;

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

// Opaque state echoed back by the authorization server. The code is pasted
// by hand, so there is no redirect to verify it against.
pub const AUTH_STATE: &str = "state-token";

// Supplies the authorization code for a given authorization URL
#[async_trait]
pub trait AuthCodeProvider: Send + Sync {
    async fn authorization_code(&self, auth_url: &Url) -> Result<String>;
}

/// Prints the URL and blocks until the operator pastes the code on stdin.
pub struct StdinCodeProvider;

#[async_trait]
impl AuthCodeProvider for StdinCodeProvider {
    async fn authorization_code(&self, auth_url: &Url) -> Result<String> {
        println!(
            "Go to the following link in your browser then type the authorization code: \n{}",
            auth_url
        );

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| Error::Auth(format!("unable to read authorization code: {}", e)))?;
        Ok(line.trim().to_string())
    }
}

pub struct FixedCodeProvider(pub String);

#[async_trait]
impl AuthCodeProvider for FixedCodeProvider {
    async fn authorization_code(&self, _auth_url: &Url) -> Result<String> {
        Ok(self.0.clone())
    }
}

// Define a trait for the token endpoint to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchange: Send + Sync {
    fn auth_url(&self) -> Url;
    async fn exchange_code(&self, code: &str) -> Result<Token>;
    async fn refresh(&self, token: &Token) -> Result<Token>;
}

/// OAuth client built from an installed-app credentials file.
pub struct OAuthConfig {
    client: BasicClient,
    scopes: Vec<String>,
}

impl OAuthConfig {
    pub async fn from_file(path: &Path, scopes: Vec<String>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Config(format!("unable to read {}: {}", path.display(), e))
        })?;
        let secret = yup_oauth2::parse_application_secret(bytes).map_err(|e| {
            Error::Config(format!("unable to parse {}: {}", path.display(), e))
        })?;
        Self::from_secret(&secret, scopes)
    }

    pub fn from_secret(secret: &ApplicationSecret, scopes: Vec<String>) -> Result<Self> {
        let auth_url = AuthUrl::new(secret.auth_uri.clone())
            .map_err(|e| Error::Config(format!("bad auth_uri: {}", e)))?;
        let token_url = TokenUrl::new(secret.token_uri.clone())
            .map_err(|e| Error::Config(format!("bad token_uri: {}", e)))?;

        let mut client = BasicClient::new(
            ClientId::new(secret.client_id.clone()),
            Some(ClientSecret::new(secret.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        if let Some(uri) = secret.redirect_uris.first() {
            let redirect = RedirectUrl::new(uri.clone())
                .map_err(|e| Error::Config(format!("bad redirect uri {}: {}", uri, e)))?;
            client = client.set_redirect_uri(redirect);
        }

        Ok(Self { client, scopes })
    }
}

#[async_trait]
impl TokenExchange for OAuthConfig {
    fn auth_url(&self) -> Url {
        let (url, _state) = self
            .client
            .authorize_url(|| CsrfToken::new(AUTH_STATE.to_string()))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .url();
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<Token> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Auth(format!("unable to retrieve token from web: {}", e)))?;
        Ok(token_from_response(&response, None))
    }

    async fn refresh(&self, token: &Token) -> Result<Token> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| Error::Auth("token has no refresh token".to_string()))?;
        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Auth(format!("unable to refresh token: {}", e)))?;
        Ok(token_from_response(&response, Some(refresh_token)))
    }
}

// Google omits the refresh token on refresh responses, so the previous one
// is carried over.
fn token_from_response(response: &BasicTokenResponse, previous_refresh: Option<String>) -> Token {
    let token_type = match response.token_type() {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    };

    Token {
        access_token: response.access_token().secret().clone(),
        token_type,
        refresh_token: response
            .refresh_token()
            .map(|t| t.secret().clone())
            .or(previous_refresh),
        expiry: response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d),
    }
}

async fn authorize_interactively<E, P>(exchange: &E, provider: &P) -> Result<Token>
where
    E: TokenExchange + ?Sized,
    P: AuthCodeProvider + ?Sized,
{
    let auth_url = exchange.auth_url();
    let code = provider.authorization_code(&auth_url).await?;
    if code.is_empty() {
        return Err(Error::Auth("no authorization code entered".to_string()));
    }
    exchange.exchange_code(&code).await
}

/// Returns a usable token, from the cache when possible.
///
/// An expired cached token is refreshed when it carries a refresh token. If
/// there is no cached token, or it cannot be refreshed, the interactive flow
/// runs and its result is saved to `store`.
pub async fn authorize<E, P>(exchange: &E, store: &TokenStore, provider: &P) -> Result<Token>
where
    E: TokenExchange + ?Sized,
    P: AuthCodeProvider + ?Sized,
{
    match store.load() {
        Ok(token) if !token.is_expired() => {
            tracing::debug!(path = %store.path().display(), "Using cached OAuth token");
            return Ok(token);
        }
        Ok(token) if token.refresh_token.is_some() => match exchange.refresh(&token).await {
            Ok(refreshed) => {
                tracing::info!("Refreshed expired OAuth token");
                store.save(&refreshed)?;
                return Ok(refreshed);
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, re-authorizing: {}", e);
            }
        },
        Ok(_) => {
            tracing::info!("Cached token expired and has no refresh token, re-authorizing");
        }
        Err(e) => {
            tracing::info!("{}, starting authorization flow", e);
        }
    }

    let token = authorize_interactively(exchange, provider).await?;
    store.save(&token)?;
    Ok(token)
}
