use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Unavailable,
    Timeout,
    Validation,
    Internal,
}

impl ErrorCode {
    /// Message shown to the user in place of the campaign view.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "Campaign not found.",
            ErrorCode::Unavailable => "The campaign service is unreachable; try again shortly.",
            ErrorCode::Timeout => "Loading the campaign took too long; try again.",
            ErrorCode::Validation => "That request was not valid.",
            ErrorCode::Internal => "Something went wrong.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
