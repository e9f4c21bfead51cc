use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CampaignId, DocumentRef, DonationId, SupporterId, UserId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
}

impl Goal {
    /// A goal without a name is never displayed.
    pub fn is_displayable(&self) -> bool {
        self.name.as_deref().is_some_and(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_image: Option<String>,
    #[serde(default)]
    pub about: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_goal: Option<Goal>,
    #[serde(default)]
    pub donations: Vec<DocumentRef>,
    #[serde(default)]
    pub supporters: Vec<DocumentRef>,
    #[serde(default)]
    pub followers: Vec<UserId>,
    #[serde(default)]
    pub posts: Vec<DocumentRef>,
}

impl Campaign {
    pub fn new(id: CampaignId) -> Self {
        Self {
            id,
            name: None,
            summary: String::new(),
            avatar: None,
            banner_image: None,
            about: String::new(),
            owner_id: None,
            current_goal: None,
            donations: Vec::new(),
            supporters: Vec::new(),
            followers: Vec::new(),
            posts: Vec::new(),
        }
    }

    /// Heading text: the display name, or the id when the campaign is unnamed.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.id.as_str(),
        }
    }

    pub fn displayable_goal(&self) -> Option<&Goal> {
        self.current_goal.as_ref().filter(|goal| goal.is_displayable())
    }

    pub fn summary(&self) -> CampaignSummary {
        CampaignSummary {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_default(),
            summary: self.summary.clone(),
            banner_image: self.banner_image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supporter {
    pub id: SupporterId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub donation_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub supporter: DocumentRef,
    pub created_at: DateTime<Utc>,
}

/// Donation as submitted from the support form, before it is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDonation {
    pub donation_id: DonationId,
    pub supporter_id: SupporterId,
    pub supporter_name: Option<String>,
    pub amount: u64,
    pub message: Option<String>,
}

impl NewDonation {
    pub fn new(supporter_id: SupporterId, amount: u64) -> Self {
        Self {
            donation_id: DonationId::generate(),
            supporter_id,
            supporter_name: None,
            amount,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_supporter_name(mut self, name: impl Into<String>) -> Self {
        self.supporter_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: CampaignId,
    pub name: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner_image: Option<String>,
}
