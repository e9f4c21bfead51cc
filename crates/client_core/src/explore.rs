use std::sync::{Arc, Mutex};

use gateway::CampaignGateway;
use shared::protocol::CampaignSummary;
use tracing::{debug, warn};

use crate::{
    error::{ControllerError, LoadFailure},
    state::{bounded, lock, ControllerSettings, LoadOutcome, RenderState, ViewSlot},
};

struct ExploreState {
    term: String,
    slot: ViewSlot<Vec<CampaignSummary>>,
}

/// Campaign search. The latest search wins; earlier results landing late are dropped.
pub struct ExploreController {
    gateway: Arc<dyn CampaignGateway>,
    settings: ControllerSettings,
    state: Mutex<ExploreState>,
}

impl ExploreController {
    pub fn new(gateway: Arc<dyn CampaignGateway>) -> Self {
        Self::with_settings(gateway, ControllerSettings::default())
    }

    pub fn with_settings(gateway: Arc<dyn CampaignGateway>, settings: ControllerSettings) -> Self {
        Self {
            gateway,
            settings,
            state: Mutex::new(ExploreState {
                term: String::new(),
                slot: ViewSlot::default(),
            }),
        }
    }

    pub fn render_state(&self) -> RenderState<Vec<CampaignSummary>> {
        RenderState::from(lock(&self.state).slot.phase())
    }

    pub fn term(&self) -> String {
        lock(&self.state).term.clone()
    }

    pub async fn search(&self, term: &str) -> Result<LoadOutcome, ControllerError> {
        let generation = {
            let mut state = lock(&self.state);
            let generation = state.slot.begin()?;
            state.term = term.to_string();
            generation
        };

        let result = bounded(self.settings.load_timeout, async {
            self.gateway
                .search_campaigns(term)
                .await
                .map_err(LoadFailure::from)
        })
        .await;

        match &result {
            Ok(found) => debug!(term, found = found.len(), "explore: search finished"),
            Err(failure) => warn!(term, reason = %failure.reason, "explore: search failed"),
        }
        Ok(lock(&self.state).slot.commit(generation, result))
    }

    /// Repeats the last search.
    pub async fn refresh(&self) -> Result<LoadOutcome, ControllerError> {
        let term = self.term();
        self.search(&term).await
    }

    pub fn teardown(&self) {
        lock(&self.state).slot.teardown();
    }
}

#[cfg(test)]
#[path = "tests/explore_tests.rs"]
mod tests;
