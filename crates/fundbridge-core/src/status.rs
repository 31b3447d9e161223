use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Campaign lifecycle: `NotStarted -> InProgress -> {Succeeded, FailedClosed}`.
/// Transitions happen on-chain (`donate`, `closeCampaign`, `withdrawAll`);
/// this type only describes what a read shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    NotStarted,
    InProgress,
    Succeeded,
    FailedClosed,
}

impl CampaignStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedClosed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::InProgress => "In progress",
            Self::Succeeded => "Goal reached",
            Self::FailedClosed => "Closed",
        }
    }
}

/// Closed campaigns are judged by the flag the contract stored when it closed
/// them. Open campaigns are judged by what has been raised so far.
pub fn derive_status(is_active: bool, raised_wei: U256, _goal_wei: U256, was_goal_reached: bool) -> CampaignStatus {
    if !is_active {
        return if was_goal_reached {
            CampaignStatus::Succeeded
        } else {
            CampaignStatus::FailedClosed
        };
    }
    if raised_wei.is_zero() {
        CampaignStatus::NotStarted
    } else {
        CampaignStatus::InProgress
    }
}

/// Live comparison, independent of the stored flag. A zero goal is never "reached".
pub fn goal_reached_live(raised_wei: U256, goal_wei: U256) -> bool {
    !goal_wei.is_zero() && raised_wei >= goal_wei
}
