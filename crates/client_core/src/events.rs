//! Notifications from controllers to whatever presentation layer subscribes.

use shared::domain::CampaignId;

use crate::state::{RenderState, ViewModel};

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    StateChanged {
        campaign_id: Option<CampaignId>,
        state: RenderState<ViewModel>,
    },
    DonationFormToggled {
        active: bool,
    },
    StaleResponseDiscarded {
        campaign_id: CampaignId,
        generation: u64,
    },
    TornDown,
}
