//! Gmail API module split into logical submodules
//!
//! - auth: OAuth authorization flow and token refresh
//! - token_store: flat-file token cache
//! - messages: message list/get/attachment calls

pub mod auth;
pub mod messages;
pub mod token_store;

pub use auth::{authorize, AuthCodeProvider, OAuthConfig, TokenExchange};
pub use messages::{GmailClient, MailClient};
pub use token_store::{Token, TokenStore};
