use axum::{Extension, Json, extract::State};
use rand::Rng;
use tracing::info;

use fundbridge_db::models::OtpCheck;
use fundbridge_types::api::{
    Claims, IdentitySessionResponse, KycStatusResponse, MarkVerifiedRequest, OtpSentResponse, VerifyOtpRequest,
};
use fundbridge_types::models::NotificationKind;

use crate::audit_log;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::notifications::notify;
use crate::state::{AppState, run_db};

const OTP_DIGITS: usize = 6;

pub async fn send_otp(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<OtpSentResponse>, ApiError> {
    let user = current_user(&state, &claims).await?;
    if user.kyc_otp_verified {
        return Err(ApiError::Conflict("email is already verified".into()));
    }

    let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
    let expires_at = chrono::Utc::now().timestamp() + state.otp_ttl_secs;

    let email = user.email.clone();
    let stored = code.clone();
    run_db(&state, move |db| db.upsert_otp(&email, &stored, expires_at)).await?;

    state.mailer.send_otp(&user.email, &code, state.otp_ttl_secs).await?;
    info!(user = %user.id, "Verification code issued");

    Ok(Json(OtpSentResponse {
        sent: true,
        expires_in_secs: state.otp_ttl_secs,
    }))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<KycStatusResponse>, ApiError> {
    let code = req.code.trim().to_string();
    if code.len() != OTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("code must be 6 digits"));
    }

    let email = claims.email.clone();
    let uid = claims.sub.to_string();
    let now = chrono::Utc::now().timestamp();
    let check = run_db(&state, move |db| {
        let check = db.verify_otp(&email, &code, now)?;
        if check == OtpCheck::Valid {
            db.set_kyc_otp_verified(&uid)?;
        }
        Ok(check)
    })
    .await?;

    match check {
        OtpCheck::Valid => {}
        OtpCheck::Invalid { attempts_left } => {
            return Err(ApiError::bad_request(format!(
                "incorrect code, {} attempt(s) left",
                attempts_left
            )));
        }
        OtpCheck::Expired => return Err(ApiError::bad_request("code expired, request a new one")),
        OtpCheck::Missing => return Err(ApiError::bad_request("no pending code, request a new one")),
        OtpCheck::TooManyAttempts => {
            return Err(ApiError::bad_request("too many attempts, request a new code"));
        }
    }

    info!(user = %claims.sub, "Email verified");
    notify(
        &state,
        claims.sub,
        NotificationKind::Kyc,
        "Your email address has been verified.".into(),
        None,
    )
    .await;

    let user = current_user(&state, &claims).await?;
    Ok(Json(KycStatusResponse {
        kyc_otp_verified: user.kyc_otp_verified,
        kyc_verified: user.kyc_verified,
    }))
}

pub async fn identity_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<IdentitySessionResponse>, ApiError> {
    let user = current_user(&state, &claims).await?;
    if !user.kyc_otp_verified {
        return Err(ApiError::Forbidden("verify your email before identity verification".into()));
    }
    if user.kyc_verified {
        return Err(ApiError::Conflict("identity is already verified".into()));
    }

    let session = state
        .stripe()?
        .create_verification_session(&user.id.to_string())
        .await?;
    info!(user = %user.id, session = %session.id, "Identity verification session created");

    Ok(Json(IdentitySessionResponse {
        session_id: session.id,
        client_secret: session.client_secret,
        url: session.url,
    }))
}

pub async fn mark_verified(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkVerifiedRequest>,
) -> Result<Json<KycStatusResponse>, ApiError> {
    let session = state.stripe()?.get_verification_session(&req.session_id).await?;

    let owner = session.metadata.get("user_id").map(String::as_str);
    if owner != Some(claims.sub.to_string().as_str()) {
        return Err(ApiError::Forbidden("verification session belongs to another user".into()));
    }
    if session.status != "verified" {
        return Err(ApiError::Conflict(format!(
            "verification is not complete (status: {})",
            session.status
        )));
    }

    complete_identity(&state, claims.sub).await?;

    let user = current_user(&state, &claims).await?;
    Ok(Json(KycStatusResponse {
        kyc_otp_verified: user.kyc_otp_verified,
        kyc_verified: user.kyc_verified,
    }))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<KycStatusResponse>, ApiError> {
    let user = current_user(&state, &claims).await?;
    Ok(Json(KycStatusResponse {
        kyc_otp_verified: user.kyc_otp_verified,
        kyc_verified: user.kyc_verified,
    }))
}

/// Marks a user identity-verified. Also reached from the Stripe webhook.
pub async fn complete_identity(state: &AppState, user_id: uuid::Uuid) -> Result<(), ApiError> {
    let uid = user_id.to_string();
    let changed = run_db(state, move |db| {
        let already = db.get_user_by_id(&uid)?.is_some_and(|u| u.kyc_verified);
        if already {
            return Ok(false);
        }
        db.set_kyc_verified(&uid)
    })
    .await?;

    if changed {
        info!(user = %user_id, "Identity verified");
        notify(
            state,
            user_id,
            NotificationKind::Kyc,
            "Your identity has been verified. You can now create campaigns and list items.".into(),
            None,
        )
        .await;
        audit_log::record(state, "KYC_VERIFIED", format!("user={}", user_id));
    }
    Ok(())
}

/// Campaign creation and listing items are limited to identity-verified users.
pub async fn require_verified(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    let user = current_user(state, claims).await?;
    if !user.kyc_verified {
        return Err(ApiError::Forbidden("identity verification required".into()));
    }
    Ok(())
}
