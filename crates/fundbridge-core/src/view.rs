//! Presentation state derived from decoded records.
//!
//! Every amount is returned three ways: exact wei (decimal string), exact
//! ETH string, and floored MNT at the injected rate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::currency::{MntRate, format_eth, wei_to_mnt};
use crate::ipfs::resolve_ipfs_uri;
use crate::records::{Campaign, Donation, MarketplaceItem, u256_dec};
use crate::status::{CampaignStatus, derive_status, goal_reached_live};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Amount {
    #[serde(with = "u256_dec")]
    pub wei: U256,
    pub eth: String,
    #[serde(with = "u256_dec")]
    pub mnt: U256,
}

impl Amount {
    pub fn new(wei: U256, rate: MntRate) -> Self {
        Self {
            wei,
            eth: format_eth(wei),
            mnt: wei_to_mnt(wei, rate),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
    pub id: u64,
    pub owner: String,
    pub title: String,
    pub primary_category: String,
    pub description: String,
    pub image_url: String,
    pub metadata_hash: String,
    pub goal: Amount,
    pub raised: Amount,
    /// 0..=100, two decimals.
    pub progress_percent: f64,
    pub status: CampaignStatus,
    pub status_label: &'static str,
    pub is_active: bool,
    /// Live `raised >= goal`.
    pub goal_reached: bool,
    /// The stored `wasGoalReached` flag disagrees with the live comparison.
    pub flag_mismatch: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub deadline_passed: bool,
    pub seconds_left: u64,
}

impl CampaignView {
    pub fn build(c: &Campaign, rate: MntRate, now: DateTime<Utc>, gateway: &str) -> Self {
        let status = derive_status(c.is_active, c.raised_wei, c.goal_wei, c.was_goal_reached);
        let goal_reached = goal_reached_live(c.raised_wei, c.goal_wei);
        let now_secs = now.timestamp().max(0) as u64;

        Self {
            id: c.id,
            owner: c.owner.clone(),
            title: c.title.clone(),
            primary_category: c.primary_category.clone(),
            description: c.description.clone(),
            image_url: resolve_ipfs_uri(&c.image_url, gateway),
            metadata_hash: c.metadata_hash.clone(),
            goal: Amount::new(c.goal_wei, rate),
            raised: Amount::new(c.raised_wei, rate),
            progress_percent: progress_percent(c.raised_wei, c.goal_wei),
            status,
            status_label: status.label(),
            is_active: c.is_active,
            goal_reached,
            flag_mismatch: goal_reached != c.was_goal_reached,
            deadline: i64::try_from(c.deadline)
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            deadline_passed: c.deadline <= now_secs,
            seconds_left: c.deadline.saturating_sub(now_secs),
        }
    }
}

/// Share of the goal raised, capped at 100. Zero goal reads as 0%.
pub fn progress_percent(raised: U256, goal: U256) -> f64 {
    if goal.is_zero() {
        return 0.0;
    }
    let bps = raised.saturating_mul(U256::from(10_000u64)) / goal;
    let bps = bps.min(U256::from(10_000u64)).low_u64();
    bps as f64 / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Sold,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: u64,
    pub seller: String,
    pub buyer: Option<String>,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub campaign_id: u64,
    pub price: Amount,
    pub availability: Availability,
}

impl ItemView {
    pub fn build(item: &MarketplaceItem, rate: MntRate, gateway: &str) -> Self {
        let availability = if item.is_sold {
            Availability::Sold
        } else if !item.is_active {
            Availability::Withdrawn
        } else {
            Availability::Available
        };

        Self {
            id: item.id,
            seller: item.seller.clone(),
            buyer: item.buyer.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            image_url: resolve_ipfs_uri(&item.image_url, gateway),
            campaign_id: item.campaign_id,
            price: Amount::new(item.price_wei, rate),
            availability,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DonationView {
    pub donor: String,
    pub amount: Amount,
    pub comment: String,
}

impl DonationView {
    pub fn build(d: &Donation, rate: MntRate) -> Self {
        Self {
            donor: d.donor.clone(),
            amount: Amount::new(d.amount_wei, rate),
            comment: d.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DonationSummary {
    pub total: Amount,
    pub donation_count: usize,
    pub donor_count: usize,
}

impl DonationSummary {
    pub fn build(donations: &[Donation], rate: MntRate) -> Self {
        let total = donations
            .iter()
            .fold(U256::zero(), |acc, d| acc.saturating_add(d.amount_wei));
        let donors: HashSet<&str> = donations.iter().map(|d| d.donor.as_str()).collect();

        Self {
            total: Amount::new(total, rate),
            donation_count: donations.len(),
            donor_count: donors.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::wei_per_eth;

    fn campaign(raised_eth_tenths: u64, goal_eth: u64, is_active: bool, flag: bool) -> Campaign {
        Campaign {
            id: 4,
            owner: "0x00000000000000000000000000000000000000aa".into(),
            title: "Library bus".into(),
            primary_category: "education".into(),
            description: String::new(),
            goal_wei: U256::from(goal_eth) * wei_per_eth(),
            raised_wei: U256::from(raised_eth_tenths) * wei_per_eth() / U256::from(10u64),
            is_active,
            image_url: "ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into(),
            metadata_hash: String::new(),
            deadline: 1_800_000_000,
            was_goal_reached: flag,
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_799_999_000, 0).unwrap()
    }

    #[test]
    fn active_campaign_view() {
        let view = CampaignView::build(&campaign(25, 10, true, false), MntRate::default(), now(), "https://gw.test");

        assert_eq!(view.raised.eth, "2.5");
        assert_eq!(view.raised.mnt, U256::from(15_000_000u64));
        assert_eq!(view.goal.mnt, U256::from(60_000_000u64));
        assert_eq!(view.progress_percent, 25.0);
        assert_eq!(view.status, CampaignStatus::InProgress);
        assert!(!view.goal_reached);
        assert!(!view.flag_mismatch);
        assert!(!view.deadline_passed);
        assert_eq!(view.seconds_left, 1_000);
        assert!(view.image_url.starts_with("https://gw.test/ipfs/Qm"));
    }

    #[test]
    fn closed_campaign_with_desynced_flag() {
        let view = CampaignView::build(&campaign(120, 10, false, false), MntRate::default(), now(), "https://gw.test");
        assert_eq!(view.status, CampaignStatus::FailedClosed);
        assert!(view.goal_reached);
        assert!(view.flag_mismatch);
        assert_eq!(view.progress_percent, 100.0);
    }

    #[test]
    fn progress_handles_zero_goal() {
        assert_eq!(progress_percent(U256::from(5u64), U256::zero()), 0.0);
        assert_eq!(progress_percent(U256::from(1u64), U256::from(3u64)), 33.33);
    }

    #[test]
    fn item_availability() {
        let mut item = MarketplaceItem {
            id: 1,
            seller: "0x00000000000000000000000000000000000000aa".into(),
            buyer: None,
            title: "Print".into(),
            description: String::new(),
            price_wei: wei_per_eth() / U256::from(100u64),
            image_url: String::new(),
            campaign_id: 4,
            is_sold: false,
            is_active: true,
        };
        let rate = MntRate::default();
        assert_eq!(ItemView::build(&item, rate, "").availability, Availability::Available);
        assert_eq!(ItemView::build(&item, rate, "").price.mnt, U256::from(60_000u64));

        item.is_active = false;
        assert_eq!(ItemView::build(&item, rate, "").availability, Availability::Withdrawn);

        item.is_sold = true;
        assert_eq!(ItemView::build(&item, rate, "").availability, Availability::Sold);
    }

    #[test]
    fn donation_summary_counts_unique_donors() {
        let d = |donor: &str, wei: u64| Donation {
            donor: donor.into(),
            amount_wei: U256::from(wei),
            comment: String::new(),
        };
        let summary = DonationSummary::build(&[d("0xa", 10), d("0xb", 5), d("0xa", 1)], MntRate::default());
        assert_eq!(summary.donation_count, 3);
        assert_eq!(summary.donor_count, 2);
        assert_eq!(summary.total.wei, U256::from(16u64));
    }
}
