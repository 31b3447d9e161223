use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fundbridge_chain::TxRequest;
use fundbridge_core::U256;
use fundbridge_core::currency::{format_eth, parse_eth};
use fundbridge_core::rate::RateProvider;
use fundbridge_core::records::Campaign;
use fundbridge_core::status::CampaignStatus;
use fundbridge_core::token::parse_address;
use fundbridge_core::view::{CampaignView, DonationSummary, DonationView};
use fundbridge_types::api::{CampaignTxRequest, Claims, TxResponse};

use crate::audit_log::not_found_on_revert;
use crate::error::ApiError;
use crate::kyc::require_verified;
use crate::state::AppState;

const MAX_TITLE_CHARS: usize = 120;
const MAX_COMMENT_CHARS: usize = 280;
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct CampaignQuery {
    pub status: Option<CampaignStatus>,
    pub category: Option<String>,
    pub owner: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<CampaignQuery>,
) -> Result<Json<Vec<CampaignView>>, ApiError> {
    let campaigns = state.contracts.fundraising().get_all_campaigns().await?;
    let rate = state.rate.current_rate();
    let now = Utc::now();
    let owner = match q.owner.as_deref() {
        Some(o) => Some(parse_address(o).ok_or_else(|| ApiError::bad_request("owner is not a valid address"))?),
        None => None,
    };

    let views = campaigns
        .iter()
        .filter(|c| !is_placeholder(c))
        .filter(|c| owner.is_none() || parse_address(&c.owner) == owner)
        .filter(|c| {
            q.category
                .as_deref()
                .is_none_or(|cat| c.primary_category.eq_ignore_ascii_case(cat))
        })
        .map(|c| CampaignView::build(c, rate, now, &state.ipfs_gateway))
        .filter(|v| q.status.is_none_or(|s| v.status == s))
        .collect();
    Ok(Json(views))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<CampaignView>, ApiError> {
    let campaign = state
        .contracts
        .fundraising()
        .get_campaign(id)
        .await
        .map_err(|e| not_found_on_revert(e, "campaign"))?;
    if is_placeholder(&campaign) {
        return Err(ApiError::NotFound("campaign not found".into()));
    }

    Ok(Json(CampaignView::build(
        &campaign,
        state.rate.current_rate(),
        Utc::now(),
        &state.ipfs_gateway,
    )))
}

#[derive(Debug, Serialize)]
pub struct DonationsResponse {
    pub campaign_id: u64,
    pub summary: DonationSummary,
    pub donations: Vec<DonationView>,
}

pub async fn donations(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DonationsResponse>, ApiError> {
    let history = state
        .contracts
        .fundraising()
        .get_donations_history(id)
        .await
        .map_err(|e| not_found_on_revert(e, "campaign"))?;
    let rate = state.rate.current_rate();

    Ok(Json(DonationsResponse {
        campaign_id: id,
        summary: DonationSummary::build(&history, rate),
        donations: history.iter().map(|d| DonationView::build(d, rate)).collect(),
    }))
}

/// Builds call data for a campaign write. The caller's wallet signs and sends it.
pub async fn build_tx(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CampaignTxRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    let fundraising = state.contracts.fundraising();
    let now = Utc::now().timestamp().max(0) as u64;

    let tx = match req {
        CampaignTxRequest::Create {
            title,
            primary_category,
            description,
            goal_eth,
            image_url,
            metadata_hash,
            deadline,
        } => {
            require_verified(&state, &claims).await?;
            check_title(&title)?;
            check_required("primary_category", &primary_category)?;
            check_deadline(deadline, now)?;
            let goal = positive_amount("goal_eth", &goal_eth)?;
            fundraising.create_campaign(
                title.trim(),
                primary_category.trim(),
                &description,
                goal,
                image_url.trim(),
                metadata_hash.trim(),
                deadline,
            )?
        }
        CampaignTxRequest::Donate {
            campaign_id,
            amount_eth,
            comment,
        } => {
            if comment.chars().count() > MAX_COMMENT_CHARS {
                return Err(ApiError::bad_request(format!(
                    "comment must be at most {} characters",
                    MAX_COMMENT_CHARS
                )));
            }
            let amount = positive_amount("amount_eth", &amount_eth)?;
            fundraising.donate(campaign_id, comment.trim(), amount)?
        }
        CampaignTxRequest::Close { campaign_id } => fundraising.close_campaign(campaign_id)?,
        CampaignTxRequest::Withdraw { campaign_id } => fundraising.withdraw(campaign_id)?,
        CampaignTxRequest::WithdrawAll { campaign_id } => fundraising.withdraw_all(campaign_id)?,
        CampaignTxRequest::Update {
            campaign_id,
            title,
            primary_category,
            description,
            goal_eth,
            image_url,
            deadline,
        } => {
            check_title(&title)?;
            check_required("primary_category", &primary_category)?;
            check_deadline(deadline, now)?;
            let goal = positive_amount("goal_eth", &goal_eth)?;
            fundraising.update_campaign(
                campaign_id,
                title.trim(),
                primary_category.trim(),
                &description,
                goal,
                image_url.trim(),
                deadline,
            )?
        }
        CampaignTxRequest::UpdateMetadataHash {
            campaign_id,
            metadata_hash,
        } => {
            check_required("metadata_hash", &metadata_hash)?;
            fundraising.update_metadata_hash(campaign_id, metadata_hash.trim())?
        }
    };

    debug!(user = %claims.sub, to = %tx.to, "Built campaign transaction");
    Ok(Json(tx_response(tx)))
}

/// Getters return a zeroed struct for ids that were never created.
fn is_placeholder(c: &Campaign) -> bool {
    parse_address(&c.owner) == Some([0u8; 20])
}

pub(crate) fn tx_response(tx: TxRequest) -> TxResponse {
    TxResponse {
        data: tx.data_hex(),
        value: tx.value.to_string(),
        value_eth: format_eth(tx.value),
        to: tx.to,
    }
}

pub(crate) fn positive_amount(field: &str, input: &str) -> Result<U256, ApiError> {
    let wei = parse_eth(input).map_err(|e| ApiError::bad_request(format!("{}: {}", field, e)))?;
    if wei.is_zero() {
        return Err(ApiError::bad_request(format!("{} must be greater than zero", field)));
    }
    Ok(wei)
}

pub(crate) fn check_required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn check_title(title: &str) -> Result<(), ApiError> {
    check_required("title", title)?;
    if title.trim().chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::bad_request(format!(
            "title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

fn check_deadline(deadline: u64, now: u64) -> Result<(), ApiError> {
    if deadline <= now {
        return Err(ApiError::bad_request("deadline must be in the future"));
    }
    if deadline - now > MAX_DURATION_SECS {
        return Err(ApiError::bad_request("deadline must be within 365 days"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_must_be_positive() {
        assert_eq!(
            positive_amount("goal_eth", "1.5").unwrap(),
            U256::from(1_500_000_000_000_000_000u64)
        );
        assert!(positive_amount("goal_eth", "0").is_err());
        assert!(positive_amount("goal_eth", "0.0").is_err());
        assert!(positive_amount("goal_eth", "abc").is_err());
    }

    #[test]
    fn deadline_window() {
        assert!(check_deadline(1_000, 1_000).is_err());
        assert!(check_deadline(1_001, 1_000).is_ok());
        assert!(check_deadline(1_000 + MAX_DURATION_SECS, 1_000).is_ok());
        assert!(check_deadline(1_001 + MAX_DURATION_SECS, 1_000).is_err());
    }

    #[test]
    fn title_limits() {
        assert!(check_title("  ").is_err());
        assert!(check_title("Clean water for Darkhan").is_ok());
        assert!(check_title(&"x".repeat(MAX_TITLE_CHARS + 1)).is_err());
    }

    #[test]
    fn tx_response_formats_value() {
        let tx = TxRequest {
            to: "0x5fbdb2315678afecb367f032d93f642f64180aa3".into(),
            data: vec![0xde, 0xad],
            value: U256::from(250_000_000_000_000_000u64),
        };
        let resp = tx_response(tx);
        assert_eq!(resp.data, "0xdead");
        assert_eq!(resp.value, "250000000000000000");
        assert_eq!(resp.value_eth, "0.25");
    }
}
