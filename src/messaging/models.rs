use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Represents a message to be sent via FCM.
///
/// For multicast sends the message is a template: it must not carry a target,
/// the token is filled in per recipient.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Arbitrary key/value payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,

    /// Basic notification template to use across all platforms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,

    /// Android specific options for messages sent through FCM connection server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidConfig>,

    /// Apple Push Notification Service specific options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,

    /// Registration token to send a message to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Topic name to send a message to, e.g. "weather".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Condition to send a message to, e.g. "'foo' in topics && 'bar' in topics".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Message {
    pub fn has_target(&self) -> bool {
        self.token.is_some() || self.topic.is_some() || self.condition.is_some()
    }
}

/// Basic notification template to use across all platforms.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// The URL of an image to be downloaded on the device and displayed in the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Android specific options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AndroidConfig {
    /// Message priority. Can be "NORMAL" or "HIGH".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<AndroidMessagePriority>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<AndroidNotification>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AndroidMessagePriority {
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AndroidNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Image shown in the expanded notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Apple Push Notification Service specific options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApnsConfig {
    /// HTTP request headers defined in Apple Push Notification Service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// APNs payload, the `aps` dictionary plus custom keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ApnsPayload>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcm_options: Option<ApnsFcmOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApnsPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aps: Option<Aps>,

    /// Custom data to include in the payload.
    #[serde(flatten)]
    pub custom_data: HashMap<String, serde_json::Value>,
}

/// The aps dictionary.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,

    /// Wakes the app for background processing when set to 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_available: Option<i32>,

    /// Lets a notification service extension modify the content (e.g. attach
    /// the image) when set to 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutable_content: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApnsFcmOptions {
    /// URL of an image to be displayed in the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Outcome of a multicast send, one entry per token in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchResponse {
    /// The number of messages successfully sent.
    pub success_count: usize,
    /// The number of messages that failed to send.
    pub failure_count: usize,
    /// The list of responses for each message.
    pub responses: Vec<SendResponse>,
}

impl BatchResponse {
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }
}

/// Response for an individual message in a batch.
#[derive(Debug, Clone)]
pub struct SendResponse {
    /// Whether the message was sent successfully.
    pub success: bool,
    /// The message ID, if sent successfully.
    pub message_id: Option<String>,
    /// The error, if failed.
    pub error: Option<SendError>,
}

impl SendResponse {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: SendError) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error),
        }
    }
}

/// Per-recipient delivery error.
#[derive(Debug, Clone, PartialEq)]
pub struct SendError {
    pub code: MessagingErrorCode,
    pub message: String,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Error codes reported for a single message, named as the Admin SDKs name them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingErrorCode {
    /// The token is malformed or not a valid FCM registration token.
    InvalidRegistrationToken,
    /// The app instance behind the token is gone (`UNREGISTERED`).
    RegistrationTokenNotRegistered,
    InvalidArgument,
    MismatchedCredential,
    MessageRateExceeded,
    ThirdPartyAuthError,
    ServerUnavailable,
    InternalError,
    Unknown(String),
}

impl MessagingErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRegistrationToken => "messaging/invalid-registration-token",
            Self::RegistrationTokenNotRegistered => "messaging/registration-token-not-registered",
            Self::InvalidArgument => "messaging/invalid-argument",
            Self::MismatchedCredential => "messaging/mismatched-credential",
            Self::MessageRateExceeded => "messaging/message-rate-exceeded",
            Self::ThirdPartyAuthError => "messaging/third-party-auth-error",
            Self::ServerUnavailable => "messaging/server-unavailable",
            Self::InternalError => "messaging/internal-error",
            Self::Unknown(code) => code,
        }
    }

    /// True when the token itself will never be deliverable again.
    pub fn is_token_invalid(&self) -> bool {
        matches!(
            self,
            Self::InvalidRegistrationToken | Self::RegistrationTokenNotRegistered
        )
    }

    /// Maps an FCM v1 error (`errorCode` from the `FcmError` detail, falling
    /// back to the canonical `status`) to a code.
    pub fn from_fcm(error_code: Option<&str>, status: Option<&str>, message: &str) -> Self {
        match error_code.or(status) {
            Some("UNREGISTERED") => Self::RegistrationTokenNotRegistered,
            Some("INVALID_ARGUMENT") if message.to_ascii_lowercase().contains("registration token") => {
                Self::InvalidRegistrationToken
            }
            Some("INVALID_ARGUMENT") => Self::InvalidArgument,
            Some("SENDER_ID_MISMATCH") | Some("PERMISSION_DENIED") => Self::MismatchedCredential,
            Some("QUOTA_EXCEEDED") | Some("RESOURCE_EXHAUSTED") => Self::MessageRateExceeded,
            Some("THIRD_PARTY_AUTH_ERROR") | Some("UNAUTHENTICATED") => Self::ThirdPartyAuthError,
            Some("UNAVAILABLE") => Self::ServerUnavailable,
            Some("INTERNAL") => Self::InternalError,
            Some("NOT_FOUND") => Self::RegistrationTokenNotRegistered,
            Some(other) => Self::Unknown(other.to_string()),
            None => Self::Unknown("unknown-error".to_string()),
        }
    }
}

impl fmt::Display for MessagingErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendResponseInternal {
    pub name: String,
}
