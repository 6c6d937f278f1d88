use crate::error::ParseError;
use crate::gmail_api::messages::MailClient;
use crate::types::{Message, MessagePart};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine};
use serde::Serialize;
use std::fmt;

// Gmail bodies use the URL-safe alphabet; padding varies between messages.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub const MIME_TEXT_HTML: &str = "text/html";
pub const MIME_TEXT_PLAIN: &str = "text/plain";

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartBody {
    /// Base64 data carried in the part itself.
    Inline(String),
    /// Attachment id; the data has to be fetched separately.
    Attachment(String),
    Multipart(Vec<Part>),
}

/// One node of a message body tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub mime_type: String,
    pub headers: Vec<Header>,
    pub body: PartBody,
}

impl From<&MessagePart> for Part {
    fn from(wire: &MessagePart) -> Self {
        let headers = wire
            .headers
            .iter()
            .flatten()
            .map(|h| Header {
                name: h.name.clone().unwrap_or_default(),
                value: h.value.clone().unwrap_or_default(),
            })
            .collect();

        let mime_type = wire.mime_type.clone().unwrap_or_default();
        let attachment_id = wire
            .body
            .as_ref()
            .and_then(|b| b.attachment_id.as_deref())
            .filter(|id| !id.is_empty());

        // Only multipart containers are searched; children of other types
        // (forwarded message/rfc822 parts) belong to a different message.
        let body = if mime_type.starts_with("multipart") {
            PartBody::Multipart(wire.parts.iter().flatten().map(Part::from).collect())
        } else if let Some(id) = attachment_id {
            PartBody::Attachment(id.to_string())
        } else {
            PartBody::Inline(
                wire.body
                    .as_ref()
                    .and_then(|b| b.data.clone())
                    .unwrap_or_default(),
            )
        };

        Part {
            mime_type,
            headers,
            body,
        }
    }
}

/// Fields extracted from one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body_plain: String,
    pub body_html: String,
}

impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "From: {}", self.from)?;
        writeln!(f, "To: {}", self.to)?;
        writeln!(f, "Subject: {}", self.subject)?;
        if !self.body_plain.is_empty() {
            writeln!(f)?;
            writeln!(f, "{}", self.body_plain)?;
        }
        if !self.body_html.is_empty() {
            writeln!(f)?;
            writeln!(f, "{}", self.body_html)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Also decode the first text/plain part into `body_plain`.
    pub include_plain: bool,
}

/// Value of the first header named exactly `name`, or "" if there is none.
pub fn find_header<'a>(part: &'a Part, name: &str) -> &'a str {
    part.headers
        .iter()
        .find(|h| h.name == name)
        .map(|h| h.value.as_str())
        .unwrap_or("")
}

/// First part in pre-order whose mime type is `mime_type`.
pub fn find_part_by_mime_type<'a>(part: &'a Part, mime_type: &str) -> Option<&'a Part> {
    if part.mime_type == mime_type {
        return Some(part);
    }
    match &part.body {
        PartBody::Multipart(children) => children
            .iter()
            .find_map(|child| find_part_by_mime_type(child, mime_type)),
        PartBody::Inline(_) | PartBody::Attachment(_) => None,
    }
}

pub fn decode_body(mime_type: &str, data: &str) -> Result<Vec<u8>, ParseError> {
    URL_SAFE_LENIENT
        .decode(data)
        .map_err(|e| ParseError::Decode {
            mime_type: mime_type.to_string(),
            reason: e.to_string(),
        })
}

/// Decoded body bytes of `part`, fetching the attachment when the data is
/// stored out of line.
pub async fn extract_body<C: MailClient + ?Sized>(
    client: &C,
    user_id: &str,
    message_id: &str,
    part: &Part,
) -> Result<Vec<u8>, ParseError> {
    match &part.body {
        PartBody::Inline(data) => decode_body(&part.mime_type, data),
        PartBody::Attachment(attachment_id) => {
            let data = client
                .get_attachment(user_id, message_id, attachment_id)
                .await?;
            decode_body(&part.mime_type, &data)
        }
        PartBody::Multipart(_) => Err(ParseError::Decode {
            mime_type: part.mime_type.clone(),
            reason: "multipart node carries no body".to_string(),
        }),
    }
}

async fn extract_text<C: MailClient + ?Sized>(
    client: &C,
    user_id: &str,
    message_id: &str,
    root: &Part,
    mime_type: &str,
) -> Result<String, ParseError> {
    match find_part_by_mime_type(root, mime_type) {
        Some(part) => {
            let bytes = extract_body(client, user_id, message_id, part).await?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        None => Ok(String::new()),
    }
}

pub async fn parse_message<C: MailClient + ?Sized>(
    client: &C,
    message: &Message,
    user_id: &str,
    options: ParseOptions,
) -> Result<ParsedMessage, ParseError> {
    let id = message.id.clone().unwrap_or_default();
    let payload = message
        .payload
        .as_ref()
        .ok_or_else(|| ParseError::MissingPayload(id.clone()))?;
    let root = Part::from(payload);

    let body_plain = if options.include_plain {
        extract_text(client, user_id, &id, &root, MIME_TEXT_PLAIN).await?
    } else {
        String::new()
    };
    let body_html = extract_text(client, user_id, &id, &root, MIME_TEXT_HTML).await?;

    Ok(ParsedMessage {
        from: find_header(&root, "From").to_string(),
        to: find_header(&root, "To").to_string(),
        subject: find_header(&root, "Subject").to_string(),
        id,
        body_plain,
        body_html,
    })
}
