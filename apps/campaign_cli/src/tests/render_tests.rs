use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use shared::{
    domain::{CampaignId, DocumentRef, DonationId},
    error::ErrorCode,
    protocol::{Campaign, Donation, Goal, Supporter},
};

use super::*;

fn supporter(id: &str, name: &str, total: u64) -> Supporter {
    Supporter {
        id: SupporterId::new(id),
        display_name: name.into(),
        avatar: None,
        donation_total: total,
    }
}

fn acme_view() -> ViewModel {
    let campaign_id = CampaignId::new("acme");
    let mut campaign = Campaign::new(campaign_id.clone());
    campaign.name = Some("Acme Robotics".into());
    campaign.current_goal = Some(Goal {
        name: Some("New workshop".into()),
        amount: Some(6_000),
    });
    let d1 = DocumentRef::donation(&campaign_id, &DonationId::new("1"));
    campaign.donations = vec![d1];
    let s1 = supporter("s1", "Sam", 1_250);
    ViewModel {
        donations: vec![Donation {
            id: DonationId::new("1"),
            amount: 1_250,
            message: Some("go team".into()),
            supporter: DocumentRef::supporter(&campaign_id, &s1.id),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }],
        supporters: HashMap::from([(s1.id.clone(), s1)]),
        campaign,
    }
}

#[test]
fn campaign_view_shows_goal_supporters_and_donations() {
    let text = campaign(&acme_view());
    assert!(text.starts_with("Acme Robotics\n"));
    assert!(text.contains("Goal: New workshop ($6,000)"));
    assert!(text.contains("Sam"));
    assert!(text.contains("$1,250"));
    assert!(text.contains("2024-03-01"));
    assert!(text.contains("\"go team\""));
}

#[test]
fn unnamed_goal_is_hidden() {
    let mut view = acme_view();
    view.campaign.current_goal = Some(Goal {
        name: None,
        amount: Some(100),
    });
    view.campaign.donations.clear();
    let text = campaign(&view);
    assert!(!text.contains("Goal:"));
    assert!(text.contains("No donations yet."));
}

#[test]
fn leaderboard_numbers_ranks() {
    let page = SupportersPage {
        campaign: acme_view().campaign,
        ranked: vec![supporter("s2", "Ria", 200), supporter("s1", "Sam", 50)],
    };
    let text = supporters(&page);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Acme Robotics's Supporters");
    assert!(lines[1].starts_with("  1. Ria"));
    assert!(lines[2].ends_with("$50"));
}

#[test]
fn empty_search_says_so() {
    assert_eq!(search_results("zzz", &[]), "No campaigns match 'zzz'.\n");
}

#[test]
fn failures_show_user_message_and_detail() {
    let failure = LoadFailure::new(ErrorCode::NotFound, "Campaign not found: ghost");
    let text = state::<ViewModel>(&RenderState::Failed(failure.clone()), campaign);
    assert!(text.starts_with("Campaign not found.\n"));
    assert!(text.contains("ghost"));

    let json: serde_json::Value = serde_json::from_str(&failure_json(&failure)).expect("json");
    assert_eq!(json["code"], "not_found");
}

#[test]
fn loading_state_renders_placeholder() {
    assert_eq!(
        state::<ViewModel>(&RenderState::Loading, campaign),
        "Loading...\n"
    );
}
