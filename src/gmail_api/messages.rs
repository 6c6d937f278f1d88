use crate::error::RemoteError;
use crate::types::{Message, MessagePartBody, MessagesResponse};
use async_trait::async_trait;
use reqwest::StatusCode;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

// Remote message operations, one request each
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Ids of messages matching `query`, in the order the service returns
    /// them. Only the first page is fetched.
    async fn list_messages(&self, user_id: &str, query: &str) -> Result<Vec<String>, RemoteError>;

    async fn get_message(&self, user_id: &str, message_id: &str) -> Result<Message, RemoteError>;

    /// Base64 payload of an out-of-line attachment.
    async fn get_attachment(
        &self,
        user_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<String, RemoteError>;
}

pub struct GmailClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(client: reqwest::Client, token: String) -> Self {
        Self::with_base_url(client, token, GMAIL_API_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, token: String, base_url: &str) -> Self {
        Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/users/{}", self.base_url, user_id)
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, RemoteError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized {
                status: status.as_u16(),
                body,
            },
            StatusCode::NOT_FOUND => RemoteError::NotFound(what.to_string()),
            _ => RemoteError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn list_messages(&self, user_id: &str, query: &str) -> Result<Vec<String>, RemoteError> {
        tracing::debug!(user_id, query, "Listing messages");
        let request = self
            .client
            .get(format!("{}/messages", self.user_url(user_id)))
            .query(&[("q", query)]);
        let response: MessagesResponse = self.fetch_json(request, "message list").await?;

        Ok(response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect())
    }

    async fn get_message(&self, user_id: &str, message_id: &str) -> Result<Message, RemoteError> {
        tracing::debug!(user_id, message_id, "Fetching message");
        let request = self
            .client
            .get(format!("{}/messages/{}", self.user_url(user_id), message_id))
            .query(&[("format", "full")]);
        self.fetch_json(request, &format!("message {}", message_id))
            .await
    }

    async fn get_attachment(
        &self,
        user_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<String, RemoteError> {
        tracing::debug!(user_id, message_id, attachment_id, "Fetching attachment");
        let request = self.client.get(format!(
            "{}/messages/{}/attachments/{}",
            self.user_url(user_id),
            message_id,
            attachment_id
        ));
        let body: MessagePartBody = self
            .fetch_json(request, &format!("attachment {}", attachment_id))
            .await?;
        Ok(body.data.unwrap_or_default())
    }
}
