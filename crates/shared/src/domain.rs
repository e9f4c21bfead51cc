use std::fmt;

use serde::{Deserialize, Serialize};

pub const CAMPAIGNS_COLLECTION: &str = "campaigns";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(CampaignId);
id_newtype!(SupporterId);
id_newtype!(DonationId);
id_newtype!(UserId);
id_newtype!(PostId);

impl DonationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Pointer from one document to another, addressed by collection path and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn supporter(campaign_id: &CampaignId, supporter_id: &SupporterId) -> Self {
        Self::new(supporters_collection(campaign_id), supporter_id.as_str())
    }

    pub fn donation(campaign_id: &CampaignId, donation_id: &DonationId) -> Self {
        Self::new(donations_collection(campaign_id), donation_id.as_str())
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

pub fn supporters_collection(campaign_id: &CampaignId) -> String {
    format!("{CAMPAIGNS_COLLECTION}/{campaign_id}/supporters")
}

pub fn donations_collection(campaign_id: &CampaignId) -> String {
    format!("{CAMPAIGNS_COLLECTION}/{campaign_id}/donations")
}

/// Renders a whole-unit amount the way supporter cards show it, e.g. `$6,000`.
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}")
}
