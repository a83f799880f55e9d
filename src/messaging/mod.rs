//! Firebase Cloud Messaging module.
//!
//! Only multicast delivery is needed by the catalog: one template message sent
//! to many registration tokens through a single request to the FCM batch
//! endpoint, with a per-token result list in input order.

pub mod models;

#[cfg(test)]
mod tests;

use crate::core::middleware::AuthMiddleware;
use crate::core::{build_client, parse_error_response, FirebaseErrorResponse};
use crate::messaging::models::{
    BatchResponse, Message, MessagingErrorCode, SendError, SendResponse, SendResponseInternal,
};
use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use thiserror::Error;

const FCM_BATCH_URL: &str = "https://fcm.googleapis.com/batch";

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Multipart response parsing error: {0}")]
    MultipartError(String),
}

/// Anything able to deliver one message template to many device tokens.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Sends `message` to every token with a single provider call. The result
    /// list has the same length and order as `tokens`.
    async fn send_each_for_multicast(
        &self,
        message: &Message,
        tokens: &[String],
    ) -> Result<BatchResponse, MessagingError>;
}

#[derive(Clone)]
pub struct FirebaseMessaging {
    client: ClientWithMiddleware,
    project_id: String,
    batch_url: String,
    validate_only: bool,
}

// Wrapper for the request body required by FCM v1 API
#[derive(Serialize)]
struct SendRequest<'a> {
    validate_only: bool,
    message: &'a Message,
}

impl FirebaseMessaging {
    pub fn new(middleware: AuthMiddleware, project_id: &str) -> Self {
        Self::new_with_url(middleware, project_id, FCM_BATCH_URL)
    }

    pub fn new_with_url(middleware: AuthMiddleware, project_id: &str, batch_url: &str) -> Self {
        Self {
            client: build_client(middleware),
            project_id: project_id.to_string(),
            batch_url: batch_url.to_string(),
            validate_only: false,
        }
    }

    /// When set, FCM validates the messages but never delivers them.
    pub fn validate_only(mut self, validate_only: bool) -> Self {
        self.validate_only = validate_only;
        self
    }

    /// Sends `base_message` to every token in one batch request. Honors
    /// [`FirebaseMessaging::validate_only`].
    pub async fn send_multicast(
        &self,
        base_message: &Message,
        tokens: &[String],
    ) -> Result<BatchResponse, MessagingError> {
        if base_message.has_target() {
            return Err(MessagingError::ApiError(
                "Multicast base message must not have a target (token, topic, or condition).".to_string(),
            ));
        }

        if tokens.is_empty() {
            return Ok(BatchResponse::default());
        }

        let messages: Vec<Message> = tokens
            .iter()
            .map(|token| {
                let mut msg = base_message.clone();
                msg.token = Some(token.clone());
                msg
            })
            .collect();

        self.send_batch(&messages, self.validate_only).await
    }

    async fn send_batch(&self, messages: &[Message], dry_run: bool) -> Result<BatchResponse, MessagingError> {
        let boundary = format!(
            "batch_{}",
            rand::rng()
                .sample_iter(Alphanumeric)
                .take(24)
                .map(char::from)
                .collect::<String>()
        );
        let body = self.build_multipart_body(messages, dry_run, &boundary)?;

        let response = self
            .client
            .post(&self.batch_url)
            .header(header::CONTENT_TYPE, format!("multipart/mixed; boundary={}", boundary))
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MessagingError::ApiError(
                parse_error_response(response, "FCM batch send failed").await,
            ));
        }

        let multipart_boundary = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .and_then(|ct| ct.split("boundary=").nth(1))
            .map(|s| s.trim_matches('"').to_string())
            .ok_or_else(|| MessagingError::MultipartError("Multipart boundary not found in response".to_string()))?;

        let text = response.text().await?;
        let responses = parse_multipart_response(&text, &multipart_boundary)?;

        if responses.len() != messages.len() {
            return Err(MessagingError::MultipartError(format!(
                "Expected {} response parts, got {}",
                messages.len(),
                responses.len()
            )));
        }

        Ok(BatchResponse::from_responses(responses))
    }

    fn build_multipart_body(&self, messages: &[Message], dry_run: bool, boundary: &str) -> Result<Vec<u8>, MessagingError> {
        let post_url = format!("/v1/projects/{}/messages:send", self.project_id);
        let mut body = Vec::new();

        for (index, message) in messages.iter().enumerate() {
            let request_body = serde_json::to_string(&SendRequest {
                validate_only: dry_run,
                message,
            })?;

            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(b"Content-Type: application/http\r\n");
            body.extend_from_slice(b"Content-Transfer-Encoding: binary\r\n");
            body.extend_from_slice(format!("Content-ID: {}\r\n\r\n", index + 1).as_bytes());
            body.extend_from_slice(format!("POST {}\r\n", post_url).as_bytes());
            body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
            body.extend_from_slice(request_body.as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        Ok(body)
    }
}

#[async_trait]
impl PushProvider for FirebaseMessaging {
    async fn send_each_for_multicast(
        &self,
        message: &Message,
        tokens: &[String],
    ) -> Result<BatchResponse, MessagingError> {
        self.send_multicast(message, tokens).await
    }
}

/// Splits a `multipart/mixed` batch response into per-message results,
/// ordered by their `Content-ID: response-N` header when present.
pub(crate) fn parse_multipart_response(body: &str, boundary: &str) -> Result<Vec<SendResponse>, MessagingError> {
    let delimiter = format!("--{}", boundary);
    let mut indexed = Vec::new();

    for (position, part) in body
        .split(&delimiter)
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "--")
        .enumerate()
    {
        let (part_headers, inner_response) = split_head(part)
            .ok_or_else(|| MessagingError::MultipartError("Invalid multipart part format".to_string()))?;
        let (status_head, json_body) = split_head(inner_response)
            .ok_or_else(|| MessagingError::MultipartError("Invalid inner HTTP response format".to_string()))?;

        let json_body = json_body.trim();
        if json_body.is_empty() {
            return Err(MessagingError::MultipartError("Empty JSON body in response part".to_string()));
        }

        let order = content_id(part_headers).unwrap_or(position + 1);
        let status_line = status_head.lines().next().unwrap_or("");

        let response = if status_line.contains(" 200 ") {
            let sent: SendResponseInternal = serde_json::from_str(json_body).map_err(|_| {
                MessagingError::MultipartError("Failed to parse successful response part".to_string())
            })?;
            SendResponse::sent(sent.name)
        } else {
            SendResponse::failed(parse_send_error(json_body)?)
        };

        indexed.push((order, response));
    }

    indexed.sort_by_key(|(order, _)| *order);
    Ok(indexed.into_iter().map(|(_, response)| response).collect())
}

fn split_head(text: &str) -> Option<(&str, &str)> {
    text.split_once("\r\n\r\n").or_else(|| text.split_once("\n\n"))
}

fn content_id(headers: &str) -> Option<usize> {
    headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-id"))
        .and_then(|(_, value)| value.trim().rsplit('-').next()?.parse().ok())
}

fn parse_send_error(json_body: &str) -> Result<SendError, MessagingError> {
    let error_response: FirebaseErrorResponse = serde_json::from_str(json_body).map_err(|_| {
        MessagingError::MultipartError("Failed to parse error response part".to_string())
    })?;

    let error = error_response.error;
    let error_code = error
        .details
        .as_ref()
        .and_then(|details| details.iter().find_map(|d| d.error_code.as_deref()));

    Ok(SendError {
        code: MessagingErrorCode::from_fcm(error_code, error.status.as_deref(), &error.message),
        message: error.message,
    })
}
