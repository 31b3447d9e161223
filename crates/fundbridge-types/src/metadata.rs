//! Off-chain campaign document pinned to IPFS.
//!
//! The chain only stores the CID (`metadataHash`); everything the campaign
//! wizard collects beyond the on-chain fields lives here. Unknown keys are
//! kept in `extra` so documents written by newer clients survive a round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMetadata {
    #[serde(default)]
    pub basics: Basics,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub story: Story,
    #[serde(default)]
    pub people: People,
    #[serde(default)]
    pub payment_info: PaymentInfo,
    #[serde(default)]
    pub promotion: Promotion,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Basics {
    pub title: String,
    pub subtitle: Option<String>,
    pub primary_category: String,
    pub secondary_category: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub target_launch_date: Option<String>,
    pub duration_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reward {
    pub title: String,
    pub description: String,
    /// Pledge needed to claim the reward, in tögrög.
    pub amount: u64,
    pub quantity: Option<u32>,
    pub estimated_delivery: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Story {
    pub description: String,
    pub risks: Option<String>,
    pub faq: Vec<FaqEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct People {
    pub creator_name: Option<String>,
    pub creator_bio: Option<String>,
    pub collaborators: Vec<Collaborator>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Collaborator {
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentInfo {
    pub wallet_address: Option<String>,
    pub bank_name: Option<String>,
    pub account_holder: Option<String>,
    pub account_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Promotion {
    pub website: Option<String>,
    pub social_links: Vec<String>,
    pub tags: Vec<String>,
}

impl CampaignMetadata {
    /// Structural checks applied before pinning and after fetching.
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.basics.title.trim().is_empty() {
            problems.push("basics.title is required".to_string());
        }
        if self.basics.primary_category.trim().is_empty() {
            problems.push("basics.primaryCategory is required".to_string());
        }
        if let Some(days) = self.basics.duration_days {
            if days == 0 || days > 365 {
                problems.push("basics.durationDays must be between 1 and 365".to_string());
            }
        }
        for (i, reward) in self.rewards.iter().enumerate() {
            if reward.title.trim().is_empty() {
                problems.push(format!("rewards[{}].title is required", i));
            }
            if reward.amount == 0 {
                problems.push(format!("rewards[{}].amount must be positive", i));
            }
        }
        if let Some(wallet) = &self.payment_info.wallet_address {
            let hex = wallet.strip_prefix("0x").unwrap_or("");
            if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                problems.push("paymentInfo.walletAddress is not a valid address".to_string());
            }
        }

        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_document_and_keeps_unknown_sections() {
        let doc: CampaignMetadata = serde_json::from_str(
            r#"{
                "basics": {"title": "Ger school", "primaryCategory": "education"},
                "rewards": [{"title": "Postcard", "description": "", "amount": 20000}],
                "draftVersion": 4
            }"#,
        )
        .unwrap();

        assert_eq!(doc.basics.title, "Ger school");
        assert_eq!(doc.rewards.len(), 1);
        assert!(doc.story.description.is_empty());
        assert_eq!(doc.extra.get("draftVersion"), Some(&Value::from(4)));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn validate_collects_all_problems() {
        let mut doc = CampaignMetadata::default();
        doc.rewards.push(Reward::default());
        doc.payment_info.wallet_address = Some("0x1234".into());

        let problems = doc.validate().unwrap_err();
        assert_eq!(problems.len(), 5);
        assert!(problems.iter().any(|p| p.contains("walletAddress")));
    }
}
