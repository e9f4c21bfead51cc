use std::sync::{Arc, Mutex};

use gateway::CampaignGateway;
use shared::{
    domain::CampaignId,
    protocol::{Campaign, Supporter},
};
use tracing::{debug, warn};

use crate::{
    error::{ControllerError, LoadFailure},
    state::{
        bounded, compare_supporters, lock, ControllerSettings, LoadOutcome, RenderState, ViewSlot,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportersPage {
    pub campaign: Campaign,
    /// Highest donation total first.
    pub ranked: Vec<Supporter>,
}

impl SupportersPage {
    pub fn heading(&self) -> String {
        format!("{}'s Supporters", self.campaign.display_name())
    }
}

/// The full supporter leaderboard of one campaign.
pub struct SupportersController {
    gateway: Arc<dyn CampaignGateway>,
    settings: ControllerSettings,
    slot: Mutex<ViewSlot<SupportersPage>>,
}

impl SupportersController {
    pub fn new(gateway: Arc<dyn CampaignGateway>) -> Self {
        Self::with_settings(gateway, ControllerSettings::default())
    }

    pub fn with_settings(gateway: Arc<dyn CampaignGateway>, settings: ControllerSettings) -> Self {
        Self {
            gateway,
            settings,
            slot: Mutex::new(ViewSlot::default()),
        }
    }

    pub fn render_state(&self) -> RenderState<SupportersPage> {
        RenderState::from(lock(&self.slot).phase())
    }

    pub async fn load(&self, campaign_id: CampaignId) -> Result<LoadOutcome, ControllerError> {
        let generation = lock(&self.slot).begin()?;
        let result = bounded(self.settings.load_timeout, async {
            let campaign = self
                .gateway
                .fetch_campaign(&campaign_id)
                .await?
                .ok_or_else(|| LoadFailure::campaign_not_found(&campaign_id))?;
            let supporters = self.gateway.fetch_supporters(&campaign.supporters).await?;
            let mut ranked: Vec<Supporter> = supporters.into_values().collect();
            ranked.sort_by(compare_supporters);
            Ok::<_, LoadFailure>(SupportersPage { campaign, ranked })
        })
        .await;

        if let Err(failure) = &result {
            warn!(campaign_id = %campaign_id, reason = %failure.reason, "supporters: load failed");
        }
        let outcome = lock(&self.slot).commit(generation, result);
        if outcome == LoadOutcome::Discarded {
            debug!(campaign_id = %campaign_id, generation, "supporters: stale response discarded");
        }
        Ok(outcome)
    }

    pub fn teardown(&self) {
        lock(&self.slot).teardown();
    }
}

#[cfg(test)]
#[path = "tests/supporters_tests.rs"]
mod tests;
