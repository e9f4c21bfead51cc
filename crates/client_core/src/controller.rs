use std::sync::{Arc, Mutex};

use futures::future::try_join;
use gateway::CampaignGateway;
use shared::{
    domain::{CampaignId, UserId},
    protocol::NewDonation,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::{ControllerError, LoadFailure},
    events::{ControllerEvent, EVENT_CHANNEL_CAPACITY},
    state::{bounded, lock, ControllerSettings, LoadOutcome, RenderState, ViewModel, ViewSlot},
};

struct ControllerState {
    campaign_id: Option<CampaignId>,
    slot: ViewSlot<ViewModel>,
    donation_form_active: bool,
}

/// Issued when an operation enters `Loading`; only the newest ticket may commit.
#[derive(Debug, Clone)]
struct LoadTicket {
    campaign_id: CampaignId,
    generation: u64,
}

/// Drives the campaign detail page: campaign, supporters and donations, plus
/// the donate/follow actions.
///
/// Every mutation is followed by a full re-fetch instead of patching the
/// current view model, so supporter totals always come from the store.
/// The state lock is never held across a gateway call.
pub struct CampaignController {
    gateway: Arc<dyn CampaignGateway>,
    settings: ControllerSettings,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl CampaignController {
    pub fn new(gateway: Arc<dyn CampaignGateway>) -> Self {
        Self::with_settings(gateway, ControllerSettings::default())
    }

    pub fn with_settings(gateway: Arc<dyn CampaignGateway>, settings: ControllerSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            gateway,
            settings,
            state: Mutex::new(ControllerState {
                campaign_id: None,
                slot: ViewSlot::default(),
                donation_form_active: false,
            }),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn render_state(&self) -> RenderState<ViewModel> {
        RenderState::from(lock(&self.state).slot.phase())
    }

    pub fn campaign_id(&self) -> Option<CampaignId> {
        lock(&self.state).campaign_id.clone()
    }

    pub fn donation_form_active(&self) -> bool {
        lock(&self.state).donation_form_active
    }

    /// Loads `campaign_id`, superseding any load still in flight.
    pub async fn load(&self, campaign_id: CampaignId) -> Result<LoadOutcome, ControllerError> {
        let ticket = self.begin(Some(campaign_id))?;
        Ok(self.fetch_and_commit(ticket).await)
    }

    /// Re-fetches the current campaign.
    pub async fn reload(&self) -> Result<LoadOutcome, ControllerError> {
        let ticket = self.begin(None)?;
        Ok(self.fetch_and_commit(ticket).await)
    }

    pub async fn donate(&self, donation: NewDonation) -> Result<LoadOutcome, ControllerError> {
        self.close_donation_form();
        let ticket = self.begin(None)?;
        info!(
            campaign_id = %ticket.campaign_id,
            donation_id = %donation.donation_id,
            amount = donation.amount,
            "controller: applying donation"
        );
        let applied = self
            .gateway
            .apply_donation(&ticket.campaign_id, &donation)
            .await;
        self.refresh_after_mutation(ticket, applied).await
    }

    pub async fn follow(&self, follower_id: UserId) -> Result<LoadOutcome, ControllerError> {
        let ticket = self.begin(None)?;
        info!(
            campaign_id = %ticket.campaign_id,
            follower_id = %follower_id,
            "controller: applying follow"
        );
        let applied = self
            .gateway
            .apply_follow(&follower_id, &ticket.campaign_id)
            .await;
        self.refresh_after_mutation(ticket, applied).await
    }

    pub fn open_donation_form(&self) {
        self.set_donation_form(true);
    }

    pub fn close_donation_form(&self) {
        self.set_donation_form(false);
    }

    /// Drops the view: anything still in flight is discarded when it lands.
    pub fn teardown(&self) {
        {
            let mut state = lock(&self.state);
            state.slot.teardown();
            state.campaign_id = None;
            state.donation_form_active = false;
        }
        debug!("controller: torn down");
        let _ = self.events.send(ControllerEvent::TornDown);
    }

    fn set_donation_form(&self, active: bool) {
        let changed = {
            let mut state = lock(&self.state);
            if state.slot.is_torn_down() || state.donation_form_active == active {
                false
            } else {
                state.donation_form_active = active;
                true
            }
        };
        if changed {
            let _ = self
                .events
                .send(ControllerEvent::DonationFormToggled { active });
        }
    }

    fn begin(&self, campaign_id: Option<CampaignId>) -> Result<LoadTicket, ControllerError> {
        let ticket = {
            let mut state = lock(&self.state);
            if state.slot.is_torn_down() {
                return Err(ControllerError::TornDown);
            }
            let campaign_id = match campaign_id.or_else(|| state.campaign_id.clone()) {
                Some(campaign_id) => campaign_id,
                None => return Err(ControllerError::NoCampaign),
            };
            let generation = state.slot.begin()?;
            state.campaign_id = Some(campaign_id.clone());
            LoadTicket {
                campaign_id,
                generation,
            }
        };
        debug!(
            campaign_id = %ticket.campaign_id,
            generation = ticket.generation,
            "controller: loading"
        );
        self.publish_state();
        Ok(ticket)
    }

    async fn refresh_after_mutation(
        &self,
        ticket: LoadTicket,
        applied: Result<(), gateway::GatewayError>,
    ) -> Result<LoadOutcome, ControllerError> {
        if let Err(error) = applied {
            warn!(
                campaign_id = %ticket.campaign_id,
                %error,
                "controller: mutation failed"
            );
            return Ok(self.commit(&ticket, Err(LoadFailure::from(error))));
        }
        if !self.is_current(&ticket) {
            self.discard(&ticket);
            return Ok(LoadOutcome::Discarded);
        }
        Ok(self.fetch_and_commit(ticket).await)
    }

    async fn fetch_and_commit(&self, ticket: LoadTicket) -> LoadOutcome {
        let result = bounded(
            self.settings.load_timeout,
            fetch_view(self.gateway.as_ref(), &ticket.campaign_id),
        )
        .await;
        if let Err(failure) = &result {
            warn!(
                campaign_id = %ticket.campaign_id,
                code = ?failure.code,
                reason = %failure.reason,
                "controller: load failed"
            );
        }
        self.commit(&ticket, result)
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        lock(&self.state).slot.is_current(ticket.generation)
    }

    fn commit(&self, ticket: &LoadTicket, result: Result<ViewModel, LoadFailure>) -> LoadOutcome {
        let outcome = lock(&self.state).slot.commit(ticket.generation, result);
        match outcome {
            LoadOutcome::Discarded => self.discard(ticket),
            LoadOutcome::Ready | LoadOutcome::Failed => self.publish_state(),
        }
        outcome
    }

    fn discard(&self, ticket: &LoadTicket) {
        debug!(
            campaign_id = %ticket.campaign_id,
            generation = ticket.generation,
            "controller: stale response discarded"
        );
        let _ = self.events.send(ControllerEvent::StaleResponseDiscarded {
            campaign_id: ticket.campaign_id.clone(),
            generation: ticket.generation,
        });
    }

    fn publish_state(&self) {
        if self.events.receiver_count() == 0 {
            return;
        }
        let (campaign_id, state) = {
            let state = lock(&self.state);
            (state.campaign_id.clone(), RenderState::from(state.slot.phase()))
        };
        let _ = self
            .events
            .send(ControllerEvent::StateChanged { campaign_id, state });
    }
}

/// Campaign first, then supporters and donations side by side. Either
/// dependent fetch failing fails the whole load.
async fn fetch_view(
    gateway: &dyn CampaignGateway,
    campaign_id: &CampaignId,
) -> Result<ViewModel, LoadFailure> {
    let campaign = gateway
        .fetch_campaign(campaign_id)
        .await?
        .ok_or_else(|| LoadFailure::campaign_not_found(campaign_id))?;

    let (supporters, donations) = try_join(
        gateway.fetch_supporters(&campaign.supporters),
        gateway.fetch_donations(&campaign.donations),
    )
    .await?;

    Ok(ViewModel {
        campaign,
        supporters,
        donations,
    })
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
