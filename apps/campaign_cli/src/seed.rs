use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use shared::{
    domain::{CampaignId, DocumentRef, DonationId, SupporterId, UserId, CAMPAIGNS_COLLECTION},
    protocol::{Campaign, Donation, Goal, Supporter},
};
use storage::{to_document, DocumentStore};
use tracing::info;

struct SeedSupporter {
    id: &'static str,
    name: &'static str,
    donations: &'static [(&'static str, u64, Option<&'static str>)],
}

struct SeedCampaign {
    id: &'static str,
    name: &'static str,
    summary: &'static str,
    owner: &'static str,
    goal: Option<(&'static str, u64)>,
    supporters: &'static [SeedSupporter],
}

const DEMO: &[SeedCampaign] = &[
    SeedCampaign {
        id: "acme",
        name: "Acme Robotics",
        summary: "Open hardware for school robotics clubs.",
        owner: "u-acme",
        goal: Some(("New workshop", 6_000)),
        supporters: &[
            SeedSupporter {
                id: "s1",
                name: "Sam",
                donations: &[("acme-d1", 50, Some("go team"))],
            },
            SeedSupporter {
                id: "s2",
                name: "Ria",
                donations: &[("acme-d2", 120, None), ("acme-d3", 30, Some("again!"))],
            },
        ],
    },
    SeedCampaign {
        id: "bakery",
        name: "Corner Bakery",
        summary: "A second oven for the neighbourhood bakery.",
        owner: "u-bakery",
        goal: None,
        supporters: &[],
    },
];

/// Writes the demo campaigns, overwriting any earlier copy.
pub async fn seed_demo<S: DocumentStore + ?Sized>(store: &S) -> Result<usize> {
    let created_at = Utc
        .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
        .single()
        .context("invalid seed timestamp")?;
    for seed in DEMO {
        let campaign_id = CampaignId::new(seed.id);
        let mut campaign = Campaign::new(campaign_id.clone());
        campaign.name = Some(seed.name.into());
        campaign.summary = seed.summary.into();
        campaign.owner_id = Some(UserId::new(seed.owner));
        campaign.current_goal = seed.goal.map(|(name, amount)| Goal {
            name: Some(name.into()),
            amount: Some(amount),
        });

        for supporter in seed.supporters {
            let supporter_id = SupporterId::new(supporter.id);
            let supporter_ref = DocumentRef::supporter(&campaign_id, &supporter_id);
            let mut total: u64 = 0;
            for (donation_id, amount, message) in supporter.donations {
                let donation_ref =
                    DocumentRef::donation(&campaign_id, &DonationId::new(*donation_id));
                let donation = Donation {
                    id: DonationId::new(*donation_id),
                    amount: *amount,
                    message: message.map(str::to_string),
                    supporter: supporter_ref.clone(),
                    created_at,
                };
                put(store, &donation_ref, &donation).await?;
                campaign.donations.push(donation_ref);
                total += *amount;
            }
            let record = Supporter {
                id: supporter_id,
                display_name: supporter.name.into(),
                avatar: None,
                donation_total: total,
            };
            put(store, &supporter_ref, &record).await?;
            campaign.supporters.push(supporter_ref);
        }

        let campaign_ref = DocumentRef::new(CAMPAIGNS_COLLECTION, seed.id);
        put(store, &campaign_ref, &campaign).await?;
        info!(campaign_id = %campaign_id, "seed: campaign written");
    }
    Ok(DEMO.len())
}

async fn put<S, T>(store: &S, reference: &DocumentRef, value: &T) -> Result<()>
where
    S: DocumentStore + ?Sized,
    T: serde::Serialize,
{
    let document = to_document(&reference.collection, &reference.id, value)?;
    store
        .set(&reference.collection, &reference.id, document)
        .await?;
    Ok(())
}
