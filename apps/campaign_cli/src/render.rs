//! Plain-text views printed by the CLI.

use client_core::{LoadFailure, RenderState, SupportersPage, ViewModel};
use shared::{
    domain::{format_amount, SupporterId},
    error::ApiError,
    protocol::CampaignSummary,
};

pub const TOP_SUPPORTERS: usize = 3;

pub fn campaign(view: &ViewModel) -> String {
    let campaign = &view.campaign;
    let mut lines = vec![campaign.display_name().to_string()];
    if !campaign.summary.is_empty() {
        lines.push(campaign.summary.clone());
    }
    if let Some(goal) = campaign.displayable_goal() {
        let name = goal.name.as_deref().unwrap_or_default();
        lines.push(match goal.amount {
            Some(amount) => format!("Goal: {name} ({})", format_amount(amount)),
            None => format!("Goal: {name}"),
        });
    }
    lines.push(format!("Followers: {}", campaign.followers.len()));

    let top = view.top_supporters(TOP_SUPPORTERS);
    if !top.is_empty() {
        lines.push("\nTop supporters".to_string());
        lines.extend(top.into_iter().map(|supporter| {
            format!(
                "  {:<20} {}",
                supporter.display_name,
                format_amount(supporter.donation_total)
            )
        }));
    }

    if view.has_donations() {
        lines.push("\nDonations".to_string());
        for donation in &view.donations {
            let who = view
                .supporters
                .get(&SupporterId::new(donation.supporter.id.as_str()))
                .map(|s| s.display_name.as_str())
                .unwrap_or(donation.supporter.id.as_str());
            let mut line = format!(
                "  {} {:<20} {}",
                donation.created_at.format("%Y-%m-%d"),
                who,
                format_amount(donation.amount)
            );
            if let Some(message) = &donation.message {
                line.push_str(&format!("  \"{message}\""));
            }
            lines.push(line);
        }
    } else {
        lines.push("\nNo donations yet.".to_string());
    }
    text(lines)
}

pub fn supporters(page: &SupportersPage) -> String {
    let mut lines = vec![page.heading()];
    if page.ranked.is_empty() {
        lines.push("No supporters yet.".to_string());
    }
    lines.extend(page.ranked.iter().enumerate().map(|(rank, supporter)| {
        format!(
            "{:>3}. {:<20} {}",
            rank + 1,
            supporter.display_name,
            format_amount(supporter.donation_total)
        )
    }));
    text(lines)
}

pub fn search_results(term: &str, found: &[CampaignSummary]) -> String {
    if found.is_empty() {
        return format!("No campaigns match '{term}'.\n");
    }
    let mut lines = Vec::new();
    for summary in found {
        lines.push(format!("{:<12} {}", summary.id.as_str(), summary.name));
        if !summary.summary.is_empty() {
            lines.push(format!("{:<12} {}", "", summary.summary));
        }
    }
    text(lines)
}

/// Newline-terminated block of `lines`.
fn text(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn failure(failure: &LoadFailure) -> String {
    format!("{}\n({})\n", failure.user_message(), failure.reason)
}

pub fn failure_json(failure: &LoadFailure) -> String {
    let error = ApiError::new(failure.code, failure.reason.clone());
    serde_json::to_string(&error).unwrap_or_else(|_| failure.reason.clone())
}

/// Text for any render state; `Loading` only shows up when nothing was committed.
pub fn state<T>(state: &RenderState<T>, ready: impl FnOnce(&T) -> String) -> String {
    match state {
        RenderState::Loading => "Loading...\n".to_string(),
        RenderState::Failed(error) => failure(error),
        RenderState::Ready(value) => ready(value),
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
