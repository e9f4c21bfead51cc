//! Render states and the generation-stamped slot every controller commits through.

use std::{
    cmp::Ordering,
    collections::HashMap,
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::{
    domain::SupporterId,
    protocol::{Campaign, Donation, Supporter},
};

use crate::error::{ControllerError, LoadFailure};

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub load_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

/// Everything the campaign page renders once loaded. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub campaign: Campaign,
    pub supporters: HashMap<SupporterId, Supporter>,
    pub donations: Vec<Donation>,
}

impl ViewModel {
    pub fn top_supporters(&self, limit: usize) -> Vec<&Supporter> {
        let mut ranked: Vec<&Supporter> = self.supporters.values().collect();
        ranked.sort_by(|a, b| compare_supporters(a, b));
        ranked.truncate(limit);
        ranked
    }

    pub fn has_donations(&self) -> bool {
        !self.campaign.donations.is_empty()
    }
}

/// Highest donation total first; ties by id so the order is stable.
pub fn compare_supporters(a: &Supporter, b: &Supporter) -> Ordering {
    b.donation_total
        .cmp(&a.donation_total)
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase<T> {
    Idle,
    Loading,
    Failed(LoadFailure),
    Ready(T),
}

/// What presentation may show: exactly one of these at any instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState<T> {
    Loading,
    Failed(LoadFailure),
    Ready(T),
}

impl<T> RenderState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            RenderState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&LoadFailure> {
        match self {
            RenderState::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl<T: Clone> From<&Phase<T>> for RenderState<T> {
    fn from(phase: &Phase<T>) -> Self {
        match phase {
            Phase::Idle | Phase::Loading => RenderState::Loading,
            Phase::Failed(failure) => RenderState::Failed(failure.clone()),
            Phase::Ready(value) => RenderState::Ready(value.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready,
    Failed,
    /// A newer request or a teardown superseded this one; nothing was committed.
    Discarded,
}

/// Phase plus the generation counter that decides which result may be committed.
#[derive(Debug)]
pub struct ViewSlot<T> {
    generation: u64,
    torn_down: bool,
    phase: Phase<T>,
}

impl<T> Default for ViewSlot<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            torn_down: false,
            phase: Phase::Idle,
        }
    }
}

impl<T> ViewSlot<T> {
    pub fn phase(&self) -> &Phase<T> {
        &self.phase
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Enters `Loading` and returns the generation the caller must commit under.
    pub fn begin(&mut self) -> Result<u64, ControllerError> {
        if self.torn_down {
            return Err(ControllerError::TornDown);
        }
        self.generation += 1;
        self.phase = Phase::Loading;
        Ok(self.generation)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        !self.torn_down && self.generation == generation
    }

    pub fn commit(&mut self, generation: u64, result: Result<T, LoadFailure>) -> LoadOutcome {
        if !self.is_current(generation) {
            return LoadOutcome::Discarded;
        }
        match result {
            Ok(value) => {
                self.phase = Phase::Ready(value);
                LoadOutcome::Ready
            }
            Err(failure) => {
                self.phase = Phase::Failed(failure);
                LoadOutcome::Failed
            }
        }
    }

    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.generation += 1;
        self.phase = Phase::Idle;
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a whole load under the configured deadline.
pub(crate) async fn bounded<T, F>(limit: Duration, load: F) -> Result<T, LoadFailure>
where
    F: Future<Output = Result<T, LoadFailure>>,
{
    match tokio::time::timeout(limit, load).await {
        Ok(result) => result,
        Err(_) => Err(LoadFailure::timed_out(limit)),
    }
}
