//! Plumbing shared by the Firebase REST clients: auth middleware, the retrying
//! HTTP client and decoding of Google API error bodies.

pub mod middleware;


use middleware::AuthMiddleware;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorResponse {
    pub error: FirebaseErrorDetails,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseErrorDetails {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
    pub details: Option<Vec<FirebaseErrorDetail>>,
}

/// One entry of the `details` array, e.g. an `FcmError` carrying `errorCode`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseErrorDetail {
    #[serde(rename = "@type")]
    pub type_url: Option<String>,
    pub error_code: Option<String>,
}

impl FirebaseErrorResponse {
    pub fn display_message(&self) -> String {
        match &self.error.status {
            Some(status) => format!("{} ({}, code: {})", self.error.message, status, self.error.code),
            None => format!("{} (code: {})", self.error.message, self.error.code),
        }
    }
}

/// Turns a non-success response into a readable message, falling back to the
/// raw body when it is not a Google API error document.
pub async fn parse_error_response(response: reqwest::Response, default_msg: &str) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<FirebaseErrorResponse>(&text) {
        Ok(error_resp) => error_resp.display_message(),
        Err(_) if text.trim().is_empty() => format!("{}: {}", default_msg, status),
        Err(_) => format!("{} {}: {}", default_msg, status, text.trim()),
    }
}

/// Builds the HTTP client every service uses: transient-failure retries with
/// exponential backoff, then bearer-token injection.
pub fn build_client(middleware: AuthMiddleware) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    ClientBuilder::new(Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(middleware)
        .build()
}
