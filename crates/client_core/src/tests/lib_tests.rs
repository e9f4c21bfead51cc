use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use gateway::{CampaignGateway, GatewayError};
use shared::{
    domain::{CampaignId, DocumentRef, DonationId, SupporterId, UserId},
    error::ErrorCode,
    protocol::{Campaign, CampaignSummary, Donation, NewDonation, Supporter},
};
use storage::StoreError;
use tokio::sync::Notify;

use crate::{
    error::{ControllerError, LoadFailure},
    state::{LoadOutcome, Phase, ViewSlot},
};

/// Deterministic in-memory gateway with per-campaign gates for ordering tests.
#[derive(Default)]
pub(crate) struct FakeGateway {
    campaigns: Mutex<HashMap<CampaignId, Campaign>>,
    supporters: Mutex<HashMap<DocumentRef, Supporter>>,
    donations: Mutex<HashMap<DocumentRef, Donation>>,
    gates: Mutex<HashMap<CampaignId, Arc<Notify>>>,
    mutation_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
    pub fail_campaign_reads: AtomicBool,
    pub fail_supporters: AtomicBool,
    pub fail_mutations: AtomicBool,
    pub stall_supporters: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// "acme": one donation of 50 from s1, whose total is 50.
    pub fn with_acme() -> Self {
        let gateway = Self::new();
        let campaign_id = CampaignId::new("acme");
        let mut campaign = Campaign::new(campaign_id.clone());
        campaign.name = Some("Acme Robotics".into());
        gateway.insert_campaign(campaign);
        gateway.insert_supporter(&campaign_id, "s1", "Sam", 0);
        gateway.record_donation(&campaign_id, "1", "s1", 50);
        gateway
    }

    pub fn insert_campaign(&self, campaign: Campaign) {
        self.campaigns
            .lock()
            .unwrap()
            .insert(campaign.id.clone(), campaign);
    }

    pub fn insert_named(&self, id: &str, name: &str) {
        let mut campaign = Campaign::new(CampaignId::new(id));
        campaign.name = Some(name.into());
        self.insert_campaign(campaign);
    }

    pub fn insert_supporter(&self, campaign_id: &CampaignId, id: &str, name: &str, total: u64) {
        let reference = DocumentRef::supporter(campaign_id, &SupporterId::new(id));
        self.supporters.lock().unwrap().insert(
            reference.clone(),
            Supporter {
                id: SupporterId::new(id),
                display_name: name.into(),
                avatar: None,
                donation_total: total,
            },
        );
        if let Some(campaign) = self.campaigns.lock().unwrap().get_mut(campaign_id) {
            if !campaign.supporters.contains(&reference) {
                campaign.supporters.push(reference);
            }
        }
    }

    fn record_donation(&self, campaign_id: &CampaignId, id: &str, supporter: &str, amount: u64) {
        let supporter_ref = DocumentRef::supporter(campaign_id, &SupporterId::new(supporter));
        let donation_ref = DocumentRef::donation(campaign_id, &DonationId::new(id));
        self.donations.lock().unwrap().insert(
            donation_ref.clone(),
            Donation {
                id: DonationId::new(id),
                amount,
                message: None,
                supporter: supporter_ref.clone(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
        );
        if let Some(campaign) = self.campaigns.lock().unwrap().get_mut(campaign_id) {
            campaign.donations.push(donation_ref);
            if !campaign.supporters.contains(&supporter_ref) {
                campaign.supporters.push(supporter_ref.clone());
            }
        }
        self.supporters
            .lock()
            .unwrap()
            .entry(supporter_ref)
            .and_modify(|s| s.donation_total += amount)
            .or_insert_with(|| Supporter {
                id: SupporterId::new(supporter),
                display_name: supporter.into(),
                avatar: None,
                donation_total: amount,
            });
    }

    /// Holds `fetch_campaign(campaign_id)` until the returned gate is notified.
    pub fn gate(&self, campaign_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(CampaignId::new(campaign_id), Arc::clone(&gate));
        gate
    }

    pub fn ungate(&self, campaign_id: &str) {
        self.gates
            .lock()
            .unwrap()
            .remove(&CampaignId::new(campaign_id));
    }

    /// Holds every mutation until the returned gate is notified.
    pub fn gate_mutations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.mutation_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn campaign(&self, campaign_id: &str) -> Campaign {
        self.campaigns.lock().unwrap()[&CampaignId::new(campaign_id)].clone()
    }

    pub fn supporter_total(&self, campaign_id: &str, supporter: &str) -> u64 {
        let reference =
            DocumentRef::supporter(&CampaignId::new(campaign_id), &SupporterId::new(supporter));
        self.supporters.lock().unwrap()[&reference].donation_total
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_for_mutation_gate(&self) {
        let gate = self.mutation_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

fn unavailable(what: &str) -> GatewayError {
    GatewayError::Store(StoreError::Unavailable(format!("{what}: connection reset")))
}

#[async_trait]
impl CampaignGateway for FakeGateway {
    async fn fetch_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<Campaign>, GatewayError> {
        self.log(format!("fetch_campaign:{campaign_id}"));
        let gate = self.gates.lock().unwrap().get(campaign_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_campaign_reads.load(Ordering::SeqCst) {
            return Err(unavailable("fetch_campaign"));
        }
        Ok(self.campaigns.lock().unwrap().get(campaign_id).cloned())
    }

    async fn fetch_supporters(
        &self,
        supporter_refs: &[DocumentRef],
    ) -> Result<HashMap<SupporterId, Supporter>, GatewayError> {
        self.log("fetch_supporters".into());
        if self.stall_supporters.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_supporters.load(Ordering::SeqCst) {
            return Err(unavailable("fetch_supporters"));
        }
        let supporters = self.supporters.lock().unwrap();
        Ok(supporter_refs
            .iter()
            .filter_map(|r| supporters.get(r).map(|s| (s.id.clone(), s.clone())))
            .collect())
    }

    async fn fetch_donations(
        &self,
        donation_refs: &[DocumentRef],
    ) -> Result<Vec<Donation>, GatewayError> {
        self.log("fetch_donations".into());
        let donations = self.donations.lock().unwrap();
        Ok(donation_refs
            .iter()
            .filter_map(|r| donations.get(r).cloned())
            .collect())
    }

    async fn apply_donation(
        &self,
        campaign_id: &CampaignId,
        donation: &NewDonation,
    ) -> Result<(), GatewayError> {
        self.log(format!("apply_donation:{campaign_id}"));
        self.wait_for_mutation_gate().await;
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(unavailable("apply_donation"));
        }
        if !self.campaigns.lock().unwrap().contains_key(campaign_id) {
            return Err(GatewayError::CampaignNotFound(campaign_id.clone()));
        }
        self.record_donation(
            campaign_id,
            donation.donation_id.as_str(),
            donation.supporter_id.as_str(),
            donation.amount,
        );
        Ok(())
    }

    async fn apply_follow(
        &self,
        follower_id: &UserId,
        campaign_id: &CampaignId,
    ) -> Result<(), GatewayError> {
        self.log(format!("apply_follow:{campaign_id}"));
        self.wait_for_mutation_gate().await;
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(unavailable("apply_follow"));
        }
        let mut campaigns = self.campaigns.lock().unwrap();
        let campaign = campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| GatewayError::CampaignNotFound(campaign_id.clone()))?;
        if !campaign.followers.contains(follower_id) {
            campaign.followers.push(follower_id.clone());
        }
        Ok(())
    }

    async fn search_campaigns(&self, term: &str) -> Result<Vec<CampaignSummary>, GatewayError> {
        self.log(format!("search:{term}"));
        let gate = self.gates.lock().unwrap().get(&CampaignId::new(term)).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_campaign_reads.load(Ordering::SeqCst) {
            return Err(unavailable("search"));
        }
        let needle = term.to_lowercase();
        let mut found: Vec<CampaignSummary> = self
            .campaigns
            .lock()
            .unwrap()
            .values()
            .filter(|c| {
                c.name
                    .as_deref()
                    .is_some_and(|n| !n.is_empty() && n.to_lowercase().contains(&needle))
            })
            .map(Campaign::summary)
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

#[test]
fn slot_commits_only_the_latest_generation() {
    let mut slot: ViewSlot<&str> = ViewSlot::default();
    let first = slot.begin().expect("begin");
    let second = slot.begin().expect("begin");

    assert_eq!(slot.commit(first, Ok("old")), LoadOutcome::Discarded);
    assert_eq!(slot.phase(), &Phase::Loading);
    assert_eq!(slot.commit(second, Ok("new")), LoadOutcome::Ready);
    assert_eq!(slot.phase(), &Phase::Ready("new"));
}

#[test]
fn slot_rejects_work_after_teardown() {
    let mut slot: ViewSlot<&str> = ViewSlot::default();
    let generation = slot.begin().expect("begin");
    slot.teardown();

    assert_eq!(slot.commit(generation, Ok("late")), LoadOutcome::Discarded);
    assert_eq!(slot.phase(), &Phase::Idle);
    assert_eq!(slot.begin(), Err(ControllerError::TornDown));
}

#[test]
fn slot_records_failures() {
    let mut slot: ViewSlot<&str> = ViewSlot::default();
    let generation = slot.begin().expect("begin");
    let failure = LoadFailure::new(ErrorCode::Unavailable, "down");
    assert_eq!(slot.commit(generation, Err(failure.clone())), LoadOutcome::Failed);
    assert_eq!(slot.phase(), &Phase::Failed(failure));
}

#[test]
fn failure_messages_follow_error_code() {
    let failure = LoadFailure::campaign_not_found(&CampaignId::new("ghost"));
    assert_eq!(failure.code, ErrorCode::NotFound);
    assert_eq!(failure.user_message(), "Campaign not found.");
    assert!(failure.to_string().contains("ghost"));
}
