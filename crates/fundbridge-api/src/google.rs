//! Google OAuth 2.0 sign-in: authorization redirect, code exchange and
//! ID token verification against Google's published keys.

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::{ServiceError, check_status};

const SERVICE: &str = "Google";
const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

/// The verified identity carried by an ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Error)]
pub enum IdTokenError {
    #[error("invalid Google ID token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("Google ID token is signed with an unknown key")]
    UnknownKey,

    #[error("Google account has no verified email address")]
    EmailUnverified,
}

pub struct GoogleClient {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleClient {
    pub fn new(http: reqwest::Client, config: GoogleConfig) -> Self {
        Self { http, config }
    }

    pub fn authorize_url(&self, state: &str) -> Result<String, ServiceError> {
        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| ServiceError::malformed(SERVICE, e.to_string()))?;
        Ok(url.into())
    }

    /// Trades an authorization code for the user's ID token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, ServiceError> {
        let form = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&form)
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let resp = check_status(SERVICE, resp).await?;
        let body: TokenResponse = resp.json().await.map_err(ServiceError::transport(SERVICE))?;
        Ok(body.id_token)
    }

    pub async fn fetch_keys(&self) -> Result<JwkSet, ServiceError> {
        let resp = self
            .http
            .get(CERTS_URL)
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let resp = check_status(SERVICE, resp).await?;
        resp.json().await.map_err(ServiceError::transport(SERVICE))
    }

    /// Checks an ID token's signature against Google's current keys, then its claims.
    pub async fn verify(&self, id_token: &str) -> Result<Result<GoogleIdentity, IdTokenError>, ServiceError> {
        let keys = self.fetch_keys().await?;
        Ok(verify_with_keys(id_token, &keys, &self.config.client_id))
    }
}

fn verify_with_keys(id_token: &str, keys: &JwkSet, client_id: &str) -> Result<GoogleIdentity, IdTokenError> {
    let header = decode_header(id_token)?;
    let jwk = header
        .kid
        .as_deref()
        .and_then(|kid| keys.find(kid))
        .ok_or(IdTokenError::UnknownKey)?;
    let key = DecodingKey::from_jwk(jwk)?;
    validate_id_token(id_token, &key, Algorithm::RS256, client_id)
}

/// Signature, expiry, audience, issuer and `email_verified`.
pub fn validate_id_token(
    id_token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    client_id: &str,
) -> Result<GoogleIdentity, IdTokenError> {
    let mut validation = Validation::new(algorithm);
    validation.set_audience(&[client_id]);
    validation.set_issuer(&ISSUERS);
    validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

    let claims = decode::<IdTokenClaims>(id_token, key, &validation)?.claims;
    let email = match claims.email {
        Some(email) if claims.email_verified => email.to_ascii_lowercase(),
        _ => return Err(IdTokenError::EmailUnverified),
    };
    debug!(sub = %claims.sub, "Google ID token verified");

    Ok(GoogleIdentity {
        sub: claims.sub,
        email,
        name: claims.name,
    })
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};

    use super::*;

    const CLIENT_ID: &str = "1234.apps.googleusercontent.com";

    fn token(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"google-test")).unwrap()
    }

    fn claims() -> Value {
        json!({
            "iss": "https://accounts.google.com",
            "aud": CLIENT_ID,
            "sub": "110169484474386276334",
            "email": "Oyun@Gmail.com",
            "email_verified": true,
            "name": "Oyuntsetseg",
            "exp": chrono::Utc::now().timestamp() + 600,
        })
    }

    fn check(claims: Value) -> Result<GoogleIdentity, IdTokenError> {
        validate_id_token(
            &token(claims),
            &DecodingKey::from_secret(b"google-test"),
            Algorithm::HS256,
            CLIENT_ID,
        )
    }

    #[test]
    fn accepts_a_valid_token() {
        let identity = check(claims()).unwrap();
        assert_eq!(identity.sub, "110169484474386276334");
        assert_eq!(identity.email, "oyun@gmail.com");
        assert_eq!(identity.name.as_deref(), Some("Oyuntsetseg"));
    }

    #[test]
    fn rejects_other_audience_or_issuer() {
        let mut c = claims();
        c["aud"] = json!("someone-else.apps.googleusercontent.com");
        assert!(matches!(check(c), Err(IdTokenError::Invalid(_))));

        let mut c = claims();
        c["iss"] = json!("https://evil.example.com");
        assert!(matches!(check(c), Err(IdTokenError::Invalid(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let mut c = claims();
        c["exp"] = json!(chrono::Utc::now().timestamp() - 3600);
        assert!(matches!(check(c), Err(IdTokenError::Invalid(_))));
    }

    #[test]
    fn requires_verified_email() {
        let mut c = claims();
        c["email_verified"] = json!(false);
        assert!(matches!(check(c), Err(IdTokenError::EmailUnverified)));

        let mut c = claims();
        c.as_object_mut().unwrap().remove("email");
        assert!(matches!(check(c), Err(IdTokenError::EmailUnverified)));
    }

    #[test]
    fn rejects_wrong_signature() {
        let err = validate_id_token(
            &token(claims()),
            &DecodingKey::from_secret(b"not-the-key"),
            Algorithm::HS256,
            CLIENT_ID,
        );
        assert!(matches!(err, Err(IdTokenError::Invalid(_))));
    }

    #[test]
    fn unknown_key_id_is_rejected() {
        let keys = JwkSet { keys: vec![] };
        let mut header = Header::default();
        header.kid = Some("rotated-away".into());
        let t = encode(&header, &claims(), &EncodingKey::from_secret(b"google-test")).unwrap();
        assert!(matches!(verify_with_keys(&t, &keys, CLIENT_ID), Err(IdTokenError::UnknownKey)));
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let client = GoogleClient::new(
            reqwest::Client::new(),
            GoogleConfig {
                client_id: CLIENT_ID.into(),
                client_secret: "s".into(),
                redirect_url: "https://fundbridge.mn/api/auth/google/callback".into(),
            },
        );
        let url = client.authorize_url("abc.def").unwrap();
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=1234.apps.googleusercontent.com"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Ffundbridge.mn%2Fapi%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("state=abc.def"));
        assert!(url.contains("scope=openid+email+profile"));
    }
}
