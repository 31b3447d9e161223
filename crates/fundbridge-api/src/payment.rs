use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fundbridge_db::models::NewPayment;
use fundbridge_types::api::{
    Claims, PaymentConfigResponse, PaymentIntentResponse, PaymentReferenceResponse, PaymentRequest,
    QpayInvoiceResponse,
};
use fundbridge_types::models::{NotificationKind, Payment, PaymentProvider, PaymentStatus};

use crate::audit_log;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::kyc::complete_identity;
use crate::notifications::notify;
use crate::state::{AppState, run_db};
use crate::stripe::{WebhookEvent, verify_webhook_signature};

pub const MIN_PAYMENT_MNT: u64 = 100;
pub const MAX_PAYMENT_MNT: u64 = 1_000_000_000;
const HISTORY_LIMIT: u32 = 100;

fn validate_amount(req: &PaymentRequest) -> Result<(), ApiError> {
    if !(MIN_PAYMENT_MNT..=MAX_PAYMENT_MNT).contains(&req.amount_mnt) {
        return Err(ApiError::bad_request(format!(
            "amount_mnt must be between {} and {}",
            MIN_PAYMENT_MNT, MAX_PAYMENT_MNT
        )));
    }
    if req.description.as_ref().is_some_and(|d| d.chars().count() > 255) {
        return Err(ApiError::bad_request("description must be at most 255 characters"));
    }
    Ok(())
}

fn describe(req: &PaymentRequest) -> String {
    match (&req.description, req.campaign_id) {
        (Some(d), _) if !d.trim().is_empty() => d.trim().to_string(),
        (_, Some(id)) => format!("FundBridge donation to campaign #{}", id),
        _ => "FundBridge payment".to_string(),
    }
}

async fn record_payment(
    state: &AppState,
    payment_id: Uuid,
    user_id: Uuid,
    provider: PaymentProvider,
    external_id: String,
    req: &PaymentRequest,
) -> Result<(), ApiError> {
    let (id, uid) = (payment_id.to_string(), user_id.to_string());
    let (campaign_id, amount_mnt) = (req.campaign_id, req.amount_mnt);
    run_db(state, move |db| {
        db.create_payment(&NewPayment {
            id: &id,
            user_id: &uid,
            provider,
            external_id: &external_id,
            campaign_id,
            amount_mnt,
        })
    })
    .await?;
    info!(payment = %payment_id, provider = provider.as_str(), amount_mnt, "Payment recorded");
    Ok(())
}

pub async fn create_intent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_amount(&req)?;
    let stripe = state.stripe()?;

    let payment_id = Uuid::new_v4();
    let mut metadata = vec![("payment_id", payment_id.to_string()), ("user_id", claims.sub.to_string())];
    if let Some(id) = req.campaign_id {
        metadata.push(("campaign_id", id.to_string()));
    }

    let intent = stripe
        .create_payment_intent(req.amount_mnt, Some(&describe(&req)), &metadata)
        .await?;
    record_payment(&state, payment_id, claims.sub, PaymentProvider::Stripe, intent.id.clone(), &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentIntentResponse {
            payment_id,
            intent_id: intent.id,
            client_secret: intent.client_secret,
        }),
    ))
}

pub async fn create_qpay_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_amount(&req)?;
    let qpay = state.qpay()?;

    let payment_id = Uuid::new_v4();
    let invoice = qpay
        .create_invoice(&payment_id.to_string(), &claims.email, req.amount_mnt, &describe(&req))
        .await?;
    record_payment(&state, payment_id, claims.sub, PaymentProvider::Qpay, invoice.invoice_id.clone(), &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(QpayInvoiceResponse {
            payment_id,
            invoice_id: invoice.invoice_id,
            qr_text: invoice.qr_text,
            qr_image: invoice.qr_image,
            urls: invoice.urls,
        }),
    ))
}

/// Card payments settled outside the app; the user quotes the reference.
pub async fn create_card(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create_reference(state, claims, req, PaymentProvider::Card).await
}

/// Bank transfers; the reference goes in the transfer description.
pub async fn create_fiat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create_reference(state, claims, req, PaymentProvider::Fiat).await
}

async fn create_reference(
    state: AppState,
    claims: Claims,
    req: PaymentRequest,
    provider: PaymentProvider,
) -> Result<(StatusCode, Json<PaymentReferenceResponse>), ApiError> {
    validate_amount(&req)?;

    let payment_id = Uuid::new_v4();
    let reference = payment_reference(payment_id);
    record_payment(&state, payment_id, claims.sub, provider, reference.clone(), &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(PaymentReferenceResponse {
            payment_id,
            reference,
            status: PaymentStatus::Pending.as_str().to_string(),
        }),
    ))
}

/// `FB-` plus the first eight hex digits of the payment id, upper-cased.
fn payment_reference(payment_id: Uuid) -> String {
    let simple = payment_id.simple().to_string();
    format!("FB-{}", simple[..8].to_ascii_uppercase())
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let stripe = state.stripe()?;
    let secret = stripe
        .webhook_secret()
        .ok_or(ApiError::NotConfigured("Stripe webhook secret"))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("missing Stripe-Signature header"))?;

    verify_webhook_signature(&body, signature, secret, chrono::Utc::now().timestamp()).map_err(|e| {
        warn!("Rejected Stripe webhook: {}", e);
        ApiError::bad_request(format!("invalid signature: {}", e))
    })?;

    let event: WebhookEvent =
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(format!("malformed event: {}", e)))?;
    debug!(event = %event.id, kind = %event.kind, "Stripe webhook");

    let object_id = event.data.object["id"].as_str().unwrap_or_default().to_string();
    match event.kind.as_str() {
        "payment_intent.succeeded" => {
            settle(&state, PaymentProvider::Stripe, object_id, PaymentStatus::Succeeded).await?;
        }
        "payment_intent.payment_failed" | "payment_intent.canceled" => {
            settle(&state, PaymentProvider::Stripe, object_id, PaymentStatus::Failed).await?;
        }
        "identity.verification_session.verified" => {
            let user_id = event.data.object["metadata"]["user_id"]
                .as_str()
                .and_then(|s| s.parse::<Uuid>().ok());
            match user_id {
                Some(id) => complete_identity(&state, id).await?,
                None => warn!(session = %object_id, "Verified session without a user_id"),
            }
        }
        other => debug!("Ignoring Stripe event {}", other),
    }

    Ok(Json(json!({ "received": true })))
}

#[derive(Debug, Deserialize)]
pub struct QpayCallbackQuery {
    pub payment_id: Uuid,
}

/// QPay calls this URL when an invoice is paid. The callback itself is not
/// trusted; the invoice is re-checked against the QPay API.
pub async fn qpay_callback(
    State(state): State<AppState>,
    Query(q): Query<QpayCallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let qpay = state.qpay()?;

    let id = q.payment_id.to_string();
    let row = run_db(&state, move |db| db.get_payment(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("payment not found".into()))?;
    let payment = row.into_payment()?;
    if payment.provider != PaymentProvider::Qpay {
        return Err(ApiError::NotFound("payment not found".into()));
    }

    let paid = qpay.is_paid(&payment.external_id).await?;
    if paid {
        settle(&state, PaymentProvider::Qpay, payment.external_id, PaymentStatus::Succeeded).await?;
    }
    Ok(Json(json!({ "paid": paid })))
}

/// Applies a provider status change once; replays are ignored.
async fn settle(
    state: &AppState,
    provider: PaymentProvider,
    external_id: String,
    status: PaymentStatus,
) -> Result<(), ApiError> {
    let ext = external_id.clone();
    let Some(row) = run_db(state, move |db| db.set_payment_status(provider, &ext, status)).await? else {
        debug!(provider = provider.as_str(), %external_id, "No pending payment to update");
        return Ok(());
    };
    let payment = row.into_payment()?;
    info!(payment = %payment.id, status = status.as_str(), "Payment settled");

    let link = payment.campaign_id.map(|id| format!("/campaigns/{}", id));
    let message = match status {
        PaymentStatus::Succeeded => format!("Your payment of {} MNT was received.", payment.amount_mnt),
        PaymentStatus::Failed => format!("Your payment of {} MNT failed.", payment.amount_mnt),
        PaymentStatus::Pending => return Ok(()),
    };
    notify(state, payment.user_id, NotificationKind::Payment, message, link).await;

    if status == PaymentStatus::Succeeded {
        audit_log::record(
            state,
            "PAYMENT_SUCCEEDED",
            format!(
                "payment={} provider={} amount_mnt={}",
                payment.id,
                provider.as_str(),
                payment.amount_mnt
            ),
        );
    }
    Ok(())
}

pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    // Confirms the account still exists.
    current_user(&state, &claims).await?;

    let uid = claims.sub.to_string();
    let rows = run_db(&state, move |db| db.list_payments(&uid, HISTORY_LIMIT)).await?;
    let payments = rows
        .into_iter()
        .map(|r| r.into_payment())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(payments))
}

pub async fn config(State(state): State<AppState>) -> Json<PaymentConfigResponse> {
    Json(PaymentConfigResponse {
        stripe_publishable_key: state
            .stripe
            .as_ref()
            .and_then(|s| s.publishable_key())
            .map(str::to_string),
        qpay_enabled: state.qpay.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(amount_mnt: u64, campaign_id: Option<u64>, description: Option<&str>) -> PaymentRequest {
        PaymentRequest {
            amount_mnt,
            campaign_id,
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn amount_bounds() {
        assert!(validate_amount(&req(MIN_PAYMENT_MNT, None, None)).is_ok());
        assert!(validate_amount(&req(MAX_PAYMENT_MNT, None, None)).is_ok());
        assert!(validate_amount(&req(MIN_PAYMENT_MNT - 1, None, None)).is_err());
        assert!(validate_amount(&req(MAX_PAYMENT_MNT + 1, None, None)).is_err());
    }

    #[test]
    fn description_fallbacks() {
        assert_eq!(describe(&req(500, Some(3), None)), "FundBridge donation to campaign #3");
        assert_eq!(describe(&req(500, Some(3), Some(" Tree planting "))), "Tree planting");
        assert_eq!(describe(&req(500, None, Some("  "))), "FundBridge payment");
    }

    #[test]
    fn reference_shape() {
        let id: Uuid = "9f3c2a1b-0000-4000-8000-000000000000".parse().unwrap();
        assert_eq!(payment_reference(id), "FB-9F3C2A1B");
    }
}
