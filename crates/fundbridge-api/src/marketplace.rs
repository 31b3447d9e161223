use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::debug;

use fundbridge_core::rate::RateProvider;
use fundbridge_core::token::parse_address;
use fundbridge_core::view::{Availability, ItemView};
use fundbridge_types::api::{Claims, MarketplaceTxRequest, TxResponse};

use crate::audit_log::not_found_on_revert;
use crate::campaigns::{check_title, positive_amount, tx_response};
use crate::error::ApiError;
use crate::kyc::require_verified;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    pub campaign_id: Option<u64>,
    pub availability: Option<Availability>,
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(q): Query<ItemQuery>,
) -> Result<Json<Vec<ItemView>>, ApiError> {
    let items = state.contracts.marketplace().get_all_items().await?;
    let rate = state.rate.current_rate();

    let views = items
        .iter()
        .filter(|i| parse_address(&i.seller) != Some([0u8; 20]))
        .filter(|i| q.campaign_id.is_none_or(|id| i.campaign_id == id))
        .map(|i| ItemView::build(i, rate, &state.ipfs_gateway))
        .filter(|v| q.availability.is_none_or(|a| v.availability == a))
        .collect();
    Ok(Json(views))
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<ItemView>, ApiError> {
    let item = state
        .contracts
        .marketplace()
        .get_item(id)
        .await
        .map_err(|e| not_found_on_revert(e, "item"))?;
    if parse_address(&item.seller) == Some([0u8; 20]) {
        return Err(ApiError::NotFound("item not found".into()));
    }
    Ok(Json(ItemView::build(&item, state.rate.current_rate(), &state.ipfs_gateway)))
}

/// Builds call data for a marketplace write. Purchases carry the listed price as value.
pub async fn build_tx(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarketplaceTxRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    let marketplace = state.contracts.marketplace();

    let tx = match req {
        MarketplaceTxRequest::Create {
            title,
            description,
            price_eth,
            image_url,
            campaign_id,
        } => {
            require_verified(&state, &claims).await?;
            check_title(&title)?;
            let price = positive_amount("price_eth", &price_eth)?;
            marketplace.create_item(title.trim(), &description, price, image_url.trim(), campaign_id)?
        }
        MarketplaceTxRequest::Buy { item_id } => {
            let item = marketplace
                .get_item(item_id)
                .await
                .map_err(|e| not_found_on_revert(e, "item"))?;
            if parse_address(&item.seller) == Some([0u8; 20]) {
                return Err(ApiError::NotFound("item not found".into()));
            }
            if item.is_sold {
                return Err(ApiError::Conflict("item is already sold".into()));
            }
            if !item.is_active {
                return Err(ApiError::Conflict("item is no longer listed".into()));
            }
            marketplace.buy_item(item_id, item.price_wei)?
        }
        MarketplaceTxRequest::Update {
            item_id,
            title,
            description,
            price_eth,
            image_url,
        } => {
            check_title(&title)?;
            let price = positive_amount("price_eth", &price_eth)?;
            marketplace.update_item(item_id, title.trim(), &description, price, image_url.trim())?
        }
        MarketplaceTxRequest::Deactivate { item_id } => marketplace.deactivate_item(item_id)?,
    };

    debug!(user = %claims.sub, to = %tx.to, "Built marketplace transaction");
    Ok(Json(tx_response(tx)))
}
