use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use fundbridge_core::token::normalize_address;
use fundbridge_db::models::GoogleSignIn;
use fundbridge_types::api::{AuthResponse, Claims, LinkWalletRequest, LoginRequest, SignupRequest};
use fundbridge_types::models::User;

use crate::audit_log;
use crate::error::ApiError;
use crate::google::{GoogleIdentity, IdTokenError};
use crate::state::{AppState, run_db};

const TOKEN_TTL_DAYS: i64 = 30;
const OAUTH_STATE_TTL_SECS: i64 = 600;
const MAX_NAME_CHARS: usize = 100;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_ascii_lowercase();
    let name = req.name.trim().to_string();

    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("invalid email address"));
    }
    if req.password.len() < 8 || req.password.len() > 128 {
        return Err(ApiError::bad_request("password must be 8 to 128 characters"));
    }
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::bad_request("name must be 1 to 100 characters"));
    }

    // Hash password with Argon2id
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| anyhow::anyhow!("salt encoding failed: {}", e))?;
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let id = user_id.to_string();
    let row = run_db(&state, {
        let email = email.clone();
        move |db| {
            if db.get_user_by_email(&email)?.is_some() {
                return Ok(None);
            }
            db.create_user(&id, &email, &password_hash, &name)?;
            db.get_user_by_id(&id)
        }
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("an account with this email already exists".into()))?;

    let user = row.into_user()?;
    let token = create_token(&state.jwt_secret, user_id, &email)?;

    info!(user = %user_id, "User signed up");
    audit_log::record(&state, "USER_SIGNUP", format!("user={}", user_id));

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_ascii_lowercase();
    let row = run_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Google-only accounts have no password
    if row.password.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    // Verify password
    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user = row.into_user()?;
    let token = create_token(&state.jwt_secret, user.id, &user.email)?;

    Ok(Json(AuthResponse { user, token }))
}

/// Signed, short-lived `state` value for the OAuth round trip.
#[derive(Debug, Serialize, Deserialize)]
struct OAuthState {
    nonce: String,
    exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Sends the browser to Google's consent screen.
pub async fn google_start(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let google = state.google()?;
    let oauth_state = create_oauth_state(&state.jwt_secret)?;
    Ok(Redirect::to(&google.authorize_url(&oauth_state)?))
}

pub async fn google_callback(
    State(state): State<AppState>,
    Query(q): Query<GoogleCallbackQuery>,
) -> Result<Json<AuthResponse>, ApiError> {
    let google = state.google()?;
    if let Some(error) = q.error {
        return Err(ApiError::bad_request(format!("Google sign-in was not completed: {}", error)));
    }
    if !q.state.as_deref().is_some_and(|s| check_oauth_state(&state.jwt_secret, s)) {
        return Err(ApiError::bad_request("sign-in state is invalid or expired, start again"));
    }
    let code = q
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing authorization code"))?;

    let id_token = google.exchange_code(&code).await?;
    let identity = google.verify(&id_token).await?.map_err(|e| match e {
        e @ IdTokenError::EmailUnverified => ApiError::Forbidden(e.to_string()),
        other => {
            warn!("Rejected Google ID token: {}", other);
            ApiError::Unauthorized
        }
    })?;

    sign_in_google(&state, identity).await
}

/// Issues a session for a verified Google identity, creating or linking the account.
pub(crate) async fn sign_in_google(state: &AppState, identity: GoogleIdentity) -> Result<Json<AuthResponse>, ApiError> {
    let GoogleIdentity { sub, email, name } = identity;
    let name: String = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string())
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();

    let new_id = Uuid::new_v4().to_string();
    let outcome = run_db(state, move |db| db.sign_in_with_google(&new_id, &sub, &email, &name)).await?;

    let (row, created) = match outcome {
        GoogleSignIn::Existing(row) => (row, false),
        GoogleSignIn::Linked(row) => {
            info!(user = %row.id, "Linked Google account to existing user");
            (row, false)
        }
        GoogleSignIn::Created(row) => (row, true),
        GoogleSignIn::EmailTaken => {
            return Err(ApiError::Conflict(
                "this email is already linked to a different Google account".into(),
            ));
        }
    };

    let user = row.into_user()?;
    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    if created {
        info!(user = %user.id, "User signed up with Google");
        audit_log::record(state, "USER_SIGNUP", format!("user={} via=google", user.id));
    }

    Ok(Json(AuthResponse { user, token }))
}

fn create_oauth_state(secret: &str) -> anyhow::Result<String> {
    let claims = OAuthState {
        nonce: hex::encode(rand::random::<[u8; 16]>()),
        exp: (chrono::Utc::now().timestamp() + OAUTH_STATE_TTL_SECS) as usize,
    };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

pub(crate) fn check_oauth_state(secret: &str, token: &str) -> bool {
    decode::<OAuthState>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default()).is_ok()
}

pub async fn me(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> Result<Json<User>, ApiError> {
    Ok(Json(current_user(&state, &claims).await?))
}

pub async fn link_wallet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LinkWalletRequest>,
) -> Result<Json<User>, ApiError> {
    let wallet = normalize_address(&req.wallet_address)
        .ok_or_else(|| ApiError::bad_request("wallet_address must be a 0x-prefixed 20-byte hex address"))?;

    let id = claims.sub.to_string();
    run_db(&state, move |db| db.set_wallet_address(&id, &wallet)).await?;

    Ok(Json(current_user(&state, &claims).await?))
}

/// Loads the caller's user record; a token for a deleted user is treated as not found.
pub async fn current_user(state: &AppState, claims: &Claims) -> Result<User, ApiError> {
    let id = claims.sub.to_string();
    let row = run_db(state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(row.into_user()?)
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;

    Ok(token)
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
        && email.len() <= 254
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn token_round_trip() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "a@b.mn").unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "a@b.mn");
        assert!(decode_token("other", &token).is_none());
    }

    #[test]
    fn oauth_state_is_signed_and_distinct_from_sessions() {
        let state = create_oauth_state("secret").unwrap();
        assert!(check_oauth_state("secret", &state));
        assert!(!check_oauth_state("other", &state));
        assert!(!check_oauth_state("secret", "forged.state.value"));
        assert!(decode_token("secret", &state).is_none());

        let session = create_token("secret", Uuid::new_v4(), "a@b.mn").unwrap();
        assert!(!check_oauth_state("secret", &session));
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("bat@example.mn"));
        assert!(!is_valid_email("bat@example"));
        assert!(!is_valid_email("@example.mn"));
        assert!(!is_valid_email("bat example@x.mn"));
        assert!(!is_valid_email("bat@.mn"));
    }
}
