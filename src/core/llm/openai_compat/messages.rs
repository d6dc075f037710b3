//! Wire types for the chat completions API.
//!
//! Only the fields the relay reads or writes are modelled; everything else in
//! the response is ignored.

use serde::{Deserialize, Serialize};

use crate::core::conversation::ChatMessage;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Successful response body.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if it carries any non-blank content.
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
    }
}

/// Error envelope returned with non-2xx statuses.
///
/// Gemini's compatibility endpoint sometimes wraps the envelope in a list, so
/// both shapes are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorEnvelope {
    Single(ErrorResponse),
    List(Vec<ErrorResponse>),
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

impl ErrorEnvelope {
    fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Single(resp) => Some(&resp.error),
            Self::List(list) => list.first().map(|resp| &resp.error),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.detail().map(|detail| detail.message.as_str())
    }

    /// Provider error category, e.g. `invalid_request_error`.
    pub fn error_type(&self) -> Option<&str> {
        self.detail().and_then(|detail| detail.error_type.as_deref())
    }
}
