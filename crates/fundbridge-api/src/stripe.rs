//! Stripe REST client: PaymentIntents, Identity verification sessions and
//! webhook signature checks. Requests are form-encoded, responses JSON.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::error::{ServiceError, check_status};

const SERVICE: &str = "Stripe";
const API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a signed webhook payload.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSession {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("no signature matches the payload")]
    Mismatch,
}

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    publishable_key: Option<String>,
    webhook_secret: Option<String>,
}

impl StripeClient {
    pub fn new(
        http: reqwest::Client,
        secret_key: String,
        publishable_key: Option<String>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            http,
            secret_key,
            publishable_key,
            webhook_secret,
        }
    }

    pub fn publishable_key(&self) -> Option<&str> {
        self.publishable_key.as_deref()
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    /// Stripe counts MNT in hundredths, so whole tögrög are multiplied by 100.
    pub async fn create_payment_intent(
        &self,
        amount_mnt: u64,
        description: Option<&str>,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent, ServiceError> {
        let amount = amount_mnt
            .checked_mul(100)
            .ok_or_else(|| ServiceError::malformed(SERVICE, "amount too large"))?;

        let mut form = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), "mnt".to_string()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        if let Some(d) = description {
            form.push(("description".to_string(), d.to_string()));
        }
        form.extend(metadata.iter().map(|(k, v)| (format!("metadata[{}]", k), v.clone())));

        let intent: PaymentIntent = self.post("/payment_intents", &form).await?;
        debug!(intent = %intent.id, amount_mnt, "Created payment intent");
        Ok(intent)
    }

    pub async fn create_verification_session(&self, user_id: &str) -> Result<VerificationSession, ServiceError> {
        let form = vec![
            ("type".to_string(), "document".to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
        ];
        self.post("/identity/verification_sessions", &form).await
    }

    pub async fn get_verification_session(&self, id: &str) -> Result<VerificationSession, ServiceError> {
        let resp = self
            .http
            .get(format!("{}/identity/verification_sessions/{}", API_BASE, id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let resp = check_status(SERVICE, resp).await?;
        resp.json().await.map_err(ServiceError::transport(SERVICE))
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, path: &str, form: &[(String, String)]) -> Result<T, ServiceError> {
        let resp = self
            .http
            .post(format!("{}{}", API_BASE, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let resp = check_status(SERVICE, resp).await?;
        resp.json().await.map_err(ServiceError::transport(SERVICE))
    }
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=…]`) against the raw body.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::Malformed)?;
    let ts: i64 = timestamp.parse().map_err(|_| WebhookError::Malformed)?;
    if signatures.is_empty() {
        return Err(WebhookError::Malformed);
    }
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(WebhookError::Stale);
    }

    for sig in signatures {
        let Ok(expected) = hex::decode(sig) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::Malformed)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(WebhookError::Mismatch)
}
