use std::{collections::HashMap, future::Future, time::Duration};

use async_trait::async_trait;
use shared::{
    domain::{CampaignId, DocumentRef, SupporterId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{Campaign, CampaignSummary, Donation, NewDonation, Supporter},
};
use storage::StoreError;
use thiserror::Error;
use tracing::warn;

mod store_gateway;

pub use store_gateway::StoreGateway;

pub const DEFAULT_READ_RETRY_ATTEMPTS: usize = 3;
pub const DEFAULT_READ_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("campaign {0} not found")]
    CampaignNotFound(CampaignId),
    #[error("invalid request: {0}")]
    Validation(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Store(StoreError::Unavailable(_)) => ErrorCode::Unavailable,
            GatewayError::Store(StoreError::Missing { .. }) => ErrorCode::NotFound,
            GatewayError::Store(StoreError::Corrupt { .. } | StoreError::Backend(_)) => {
                ErrorCode::Internal
            }
            GatewayError::CampaignNotFound(_) => ErrorCode::NotFound,
            GatewayError::Validation(_) => ErrorCode::Validation,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(value: GatewayError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}

/// Reads and writes of campaign data against the remote store.
#[async_trait]
pub trait CampaignGateway: Send + Sync {
    /// `Ok(None)` when no record exists for `campaign_id`.
    async fn fetch_campaign(&self, campaign_id: &CampaignId)
        -> Result<Option<Campaign>, GatewayError>;

    async fn fetch_supporters(
        &self,
        supporter_refs: &[DocumentRef],
    ) -> Result<HashMap<SupporterId, Supporter>, GatewayError>;

    /// Resolved donations, in the order of `donation_refs`.
    async fn fetch_donations(
        &self,
        donation_refs: &[DocumentRef],
    ) -> Result<Vec<Donation>, GatewayError>;

    async fn apply_donation(
        &self,
        campaign_id: &CampaignId,
        donation: &NewDonation,
    ) -> Result<(), GatewayError>;

    async fn apply_follow(
        &self,
        follower_id: &UserId,
        campaign_id: &CampaignId,
    ) -> Result<(), GatewayError>;

    async fn search_campaigns(&self, term: &str) -> Result<Vec<CampaignSummary>, GatewayError>;
}

/// Exponential backoff for idempotent reads. Mutations never go through this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_READ_RETRY_ATTEMPTS,
            base_delay: DEFAULT_READ_RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut read: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match read().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt + 1 < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "gateway: transient read failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
