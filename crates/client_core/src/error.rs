use std::time::Duration;

use gateway::GatewayError;
use shared::{domain::CampaignId, error::ErrorCode};
use thiserror::Error;

/// Why a view ended up in the failed state. Carries the detail for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct LoadFailure {
    pub code: ErrorCode,
    pub reason: String,
}

impl LoadFailure {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn campaign_not_found(campaign_id: &CampaignId) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Campaign not found: {campaign_id}"),
        )
    }

    pub fn timed_out(after: Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("load did not finish within {} ms", after.as_millis()),
        )
    }

    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }
}

impl From<GatewayError> for LoadFailure {
    fn from(error: GatewayError) -> Self {
        Self::new(error.code(), error.to_string())
    }
}

/// Actions the controller refuses outright, without touching its state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("view was torn down")]
    TornDown,
    #[error("no campaign selected")]
    NoCampaign,
}
