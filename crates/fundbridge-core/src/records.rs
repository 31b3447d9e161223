use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// On-chain campaign as returned by `getCampaign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: u64,
    pub owner: String,
    pub title: String,
    pub primary_category: String,
    pub description: String,
    #[serde(with = "u256_dec")]
    pub goal_wei: U256,
    #[serde(with = "u256_dec")]
    pub raised_wei: U256,
    pub is_active: bool,
    pub image_url: String,
    pub metadata_hash: String,
    /// Unix seconds.
    pub deadline: u64,
    pub was_goal_reached: bool,
}

/// Reward item listed on the marketplace contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceItem {
    pub id: u64,
    pub seller: String,
    /// `None` while unsold (the contract stores the zero address).
    pub buyer: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(with = "u256_dec")]
    pub price_wei: U256,
    pub image_url: String,
    pub campaign_id: u64,
    pub is_sold: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub donor: String,
    #[serde(with = "u256_dec")]
    pub amount_wei: U256,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: u64,
    pub actor: String,
    pub action: String,
    pub details: String,
    pub timestamp: u64,
}

/// Serializes 256-bit integers as decimal strings; JSON numbers lose precision past 2^53.
pub mod u256_dec {
    use primitive_types::U256;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(|e| D::Error::custom(format!("invalid integer {:?}: {:?}", s, e)))
    }
}
