use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use shared::{
    domain::{CampaignId, DocumentRef, SupporterId, UserId, CAMPAIGNS_COLLECTION},
    protocol::{Campaign, CampaignSummary, Donation, NewDonation, Supporter},
};
use storage::{from_document, to_document, Document, DocumentStore, StoreError};
use tracing::{debug, info, warn};

use crate::{CampaignGateway, GatewayError, RetryPolicy};

/// `CampaignGateway` backed by any `DocumentStore`.
///
/// Mutations only go through the store's atomic field operations, so any
/// number of gateways (or processes) may share one store. There are no
/// multi-document transactions: donation writes go donation document, then
/// campaign references, then supporter total. An interrupted sequence can
/// leave a recorded donation without its total, never a total without its
/// donation.
pub struct StoreGateway<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> StoreGateway<S> {
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let store = &self.store;
        self.retry
            .run("get", move || store.get(collection, id))
            .await
    }

    /// Resolves one reference; the id is filled in when the document omits it.
    async fn resolve<T: serde::de::DeserializeOwned>(
        &self,
        reference: &DocumentRef,
    ) -> Result<Option<T>, GatewayError> {
        let Some(mut document) = self.read(&reference.collection, &reference.id).await? else {
            warn!(reference = %reference, "gateway: dangling reference skipped");
            return Ok(None);
        };
        document
            .entry("id")
            .or_insert_with(|| Value::String(reference.id.clone()));
        Ok(Some(from_document(
            &reference.collection,
            &reference.id,
            document,
        )?))
    }

    async fn require_campaign(&self, campaign_id: &CampaignId) -> Result<Campaign, GatewayError> {
        self.fetch_campaign(campaign_id)
            .await?
            .ok_or_else(|| GatewayError::CampaignNotFound(campaign_id.clone()))
    }

    /// Adds `value` to an array field of the campaign document. Returns
    /// whether it was not there yet.
    async fn add_to_campaign(
        &self,
        campaign_id: &CampaignId,
        field_name: &str,
        value: Value,
    ) -> Result<bool, GatewayError> {
        match self
            .store
            .array_union(CAMPAIGNS_COLLECTION, campaign_id.as_str(), field_name, vec![value])
            .await
        {
            Ok(added) => Ok(added > 0),
            Err(StoreError::Missing { .. }) => {
                Err(GatewayError::CampaignNotFound(campaign_id.clone()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn credit_supporter(
        &self,
        campaign_id: &CampaignId,
        donation: &NewDonation,
    ) -> Result<u64, GatewayError> {
        let reference = DocumentRef::supporter(campaign_id, &donation.supporter_id);
        let supporter = Supporter {
            id: donation.supporter_id.clone(),
            display_name: donation
                .supporter_name
                .clone()
                .unwrap_or_else(|| donation.supporter_id.to_string()),
            avatar: None,
            donation_total: donation.amount,
        };
        let document = to_document(&reference.collection, &reference.id, &supporter)?;
        if self
            .store
            .create(&reference.collection, &reference.id, document)
            .await?
        {
            return Ok(donation.amount);
        }

        Ok(self
            .store
            .increment(
                &reference.collection,
                &reference.id,
                "donation_total",
                donation.amount,
            )
            .await?)
    }
}

fn field<T: serde::Serialize>(
    campaign_id: &CampaignId,
    value: &T,
) -> Result<Value, GatewayError> {
    serde_json::to_value(value).map_err(|error| {
        GatewayError::Store(StoreError::Corrupt {
            collection: CAMPAIGNS_COLLECTION.to_string(),
            id: campaign_id.to_string(),
            reason: error.to_string(),
        })
    })
}

fn name_matches(document: &Document, needle: &str) -> bool {
    document
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .is_some_and(|name| name.to_lowercase().contains(needle))
}

#[async_trait]
impl<S: DocumentStore> CampaignGateway for StoreGateway<S> {
    async fn fetch_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<Campaign>, GatewayError> {
        let reference = DocumentRef::new(CAMPAIGNS_COLLECTION, campaign_id.as_str());
        let Some(mut document) = self.read(&reference.collection, &reference.id).await? else {
            debug!(campaign_id = %campaign_id, "gateway: campaign not found");
            return Ok(None);
        };
        document
            .entry("id")
            .or_insert_with(|| Value::String(campaign_id.to_string()));
        Ok(Some(from_document(
            &reference.collection,
            &reference.id,
            document,
        )?))
    }

    async fn fetch_supporters(
        &self,
        supporter_refs: &[DocumentRef],
    ) -> Result<HashMap<SupporterId, Supporter>, GatewayError> {
        let mut seen = HashSet::new();
        let unique: Vec<&DocumentRef> = supporter_refs
            .iter()
            .filter(|reference| seen.insert(*reference))
            .collect();

        let resolved = try_join_all(unique.iter().map(|reference| async move {
            let supporter: Option<Supporter> = self.resolve(reference).await?;
            Ok::<_, GatewayError>(supporter.map(|s| (SupporterId::new(reference.id.clone()), s)))
        }))
        .await?;

        Ok(resolved.into_iter().flatten().collect())
    }

    async fn fetch_donations(
        &self,
        donation_refs: &[DocumentRef],
    ) -> Result<Vec<Donation>, GatewayError> {
        let resolved = try_join_all(
            donation_refs
                .iter()
                .map(|reference| self.resolve::<Donation>(reference)),
        )
        .await?;
        Ok(resolved.into_iter().flatten().collect())
    }

    async fn apply_donation(
        &self,
        campaign_id: &CampaignId,
        donation: &NewDonation,
    ) -> Result<(), GatewayError> {
        if donation.amount == 0 {
            return Err(GatewayError::Validation(
                "donation amount must be positive".into(),
            ));
        }

        let campaign = self.require_campaign(campaign_id).await?;

        let donation_ref = DocumentRef::donation(campaign_id, &donation.donation_id);
        if campaign.donations.contains(&donation_ref) {
            info!(
                campaign_id = %campaign_id,
                donation_id = %donation.donation_id,
                "gateway: donation already recorded; skipping duplicate"
            );
            return Ok(());
        }
        let supporter_ref = DocumentRef::supporter(campaign_id, &donation.supporter_id);

        let record = Donation {
            id: donation.donation_id.clone(),
            amount: donation.amount,
            message: donation.message.clone(),
            supporter: supporter_ref.clone(),
            created_at: Utc::now(),
        };
        let document = to_document(&donation_ref.collection, &donation_ref.id, &record)?;
        self.store
            .create(&donation_ref.collection, &donation_ref.id, document)
            .await?;

        self.add_to_campaign(campaign_id, "supporters", field(campaign_id, &supporter_ref)?)
            .await?;
        // Only the call that appends the reference credits the total.
        if !self
            .add_to_campaign(campaign_id, "donations", field(campaign_id, &donation_ref)?)
            .await?
        {
            info!(
                campaign_id = %campaign_id,
                donation_id = %donation.donation_id,
                "gateway: donation recorded concurrently; skipping duplicate"
            );
            return Ok(());
        }

        let total = self.credit_supporter(campaign_id, donation).await?;
        info!(
            campaign_id = %campaign_id,
            donation_id = %donation.donation_id,
            supporter_id = %donation.supporter_id,
            amount = donation.amount,
            supporter_total = total,
            "gateway: donation applied"
        );
        Ok(())
    }

    async fn apply_follow(
        &self,
        follower_id: &UserId,
        campaign_id: &CampaignId,
    ) -> Result<(), GatewayError> {
        if !self
            .add_to_campaign(campaign_id, "followers", field(campaign_id, follower_id)?)
            .await?
        {
            debug!(
                campaign_id = %campaign_id,
                follower_id = %follower_id,
                "gateway: already following"
            );
            return Ok(());
        }
        info!(campaign_id = %campaign_id, follower_id = %follower_id, "gateway: follower added");
        Ok(())
    }

    async fn search_campaigns(&self, term: &str) -> Result<Vec<CampaignSummary>, GatewayError> {
        let needle = term.to_lowercase();
        let predicate = move |document: &Document| name_matches(document, &needle);
        let store = &self.store;
        let predicate = &predicate;
        let rows = self
            .retry
            .run("query", move || store.query(CAMPAIGNS_COLLECTION, predicate))
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for (id, mut document) in rows {
            document
                .entry("id")
                .or_insert_with(|| Value::String(id.clone()));
            let campaign: Campaign = from_document(CAMPAIGNS_COLLECTION, &id, document)?;
            summaries.push(campaign.summary());
        }
        Ok(summaries)
    }
}

#[cfg(test)]
#[path = "tests/store_gateway_tests.rs"]
mod tests;
