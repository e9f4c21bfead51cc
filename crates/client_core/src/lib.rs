pub mod controller;
pub mod error;
pub mod events;
pub mod explore;
pub mod overlay;
pub mod state;
pub mod supporters;

pub use controller::CampaignController;
pub use error::{ControllerError, LoadFailure};
pub use events::ControllerEvent;
pub use explore::ExploreController;
pub use overlay::{DonationOverlay, ScrollLock, ScrollLockGuard};
pub use state::{ControllerSettings, LoadOutcome, RenderState, ViewModel};
pub use supporters::{SupportersController, SupportersPage};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
