use chrono::{TimeZone, Utc};

use crate::{
    domain::{format_amount, CampaignId, DocumentRef, DonationId, SupporterId},
    protocol::{Campaign, Donation, Goal},
};

#[test]
fn formats_amounts_with_thousands_separators() {
    assert_eq!(format_amount(0), "$0");
    assert_eq!(format_amount(75), "$75");
    assert_eq!(format_amount(6000), "$6,000");
    assert_eq!(format_amount(1_234_567), "$1,234,567");
}

#[test]
fn supporter_refs_live_under_the_campaign() {
    let campaign = CampaignId::new("acme");
    let reference = DocumentRef::supporter(&campaign, &SupporterId::new("s1"));
    assert_eq!(reference.collection, "campaigns/acme/supporters");
    assert_eq!(reference.to_string(), "campaigns/acme/supporters/s1");
}

#[test]
fn display_name_falls_back_to_id() {
    let mut campaign = Campaign::new(CampaignId::new("acme"));
    assert_eq!(campaign.display_name(), "acme");
    campaign.name = Some("Acme Robotics".into());
    assert_eq!(campaign.display_name(), "Acme Robotics");
}

#[test]
fn unnamed_goal_is_not_displayed() {
    let mut campaign = Campaign::new(CampaignId::new("acme"));
    campaign.current_goal = Some(Goal {
        name: None,
        amount: Some(500),
    });
    assert!(campaign.displayable_goal().is_none());

    campaign.current_goal = Some(Goal {
        name: Some("New lathe".into()),
        amount: Some(500),
    });
    assert_eq!(campaign.displayable_goal().and_then(|g| g.amount), Some(500));
}

#[test]
fn campaign_document_tolerates_missing_collections() {
    let campaign: Campaign =
        serde_json::from_value(serde_json::json!({ "id": "acme", "name": "Acme" }))
            .expect("decode");
    assert!(campaign.donations.is_empty());
    assert!(campaign.supporters.is_empty());
    assert!(campaign.followers.is_empty());
    assert!(campaign.current_goal.is_none());
}

#[test]
fn ids_serialize_as_plain_strings() {
    let donation = Donation {
        id: DonationId::new("d1"),
        amount: 50,
        message: None,
        supporter: DocumentRef::supporter(&CampaignId::new("acme"), &SupporterId::new("s1")),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    };
    let value = serde_json::to_value(&donation).expect("encode");
    assert_eq!(value["id"], "d1");
    assert_eq!(value["supporter"]["id"], "s1");
    assert!(value.get("message").is_none());
}
