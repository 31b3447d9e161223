//! QPay v2 merchant API: bearer token, invoice creation, payment check.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use fundbridge_types::api::QpayDeepLink;

use crate::error::{ServiceError, check_status};

const SERVICE: &str = "QPay";

/// Tokens are refreshed this long before QPay says they expire.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QpayInvoice {
    pub invoice_id: String,
    pub qr_text: Option<String>,
    pub qr_image: Option<String>,
    #[serde(default)]
    pub urls: Vec<QpayDeepLink>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    rows: Vec<CheckRow>,
}

#[derive(Debug, Deserialize)]
struct CheckRow {
    payment_status: String,
}

pub struct QpayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub invoice_code: String,
    /// Public URL QPay calls when an invoice is paid; `?payment_id=` is appended.
    pub callback_url: String,
}

pub struct QpayClient {
    http: reqwest::Client,
    config: QpayConfig,
    token: Mutex<Option<(String, Instant)>>,
}

impl QpayClient {
    pub fn new(http: reqwest::Client, config: QpayConfig) -> Self {
        Self {
            http,
            config,
            token: Mutex::new(None),
        }
    }

    pub async fn create_invoice(
        &self,
        sender_invoice_no: &str,
        receiver: &str,
        amount_mnt: u64,
        description: &str,
    ) -> Result<QpayInvoice, ServiceError> {
        let token = self.access_token().await?;
        let body = json!({
            "invoice_code": self.config.invoice_code,
            "sender_invoice_no": sender_invoice_no,
            "invoice_receiver_code": receiver,
            "invoice_description": description,
            "amount": amount_mnt,
            "callback_url": format!("{}?payment_id={}", self.config.callback_url, sender_invoice_no),
        });

        let resp = self
            .http
            .post(self.url("/v2/invoice"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let invoice: QpayInvoice = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(ServiceError::transport(SERVICE))?;

        debug!(invoice = %invoice.invoice_id, amount_mnt, "Created QPay invoice");
        Ok(invoice)
    }

    /// True once any payment against the invoice is `PAID`.
    pub async fn is_paid(&self, invoice_id: &str) -> Result<bool, ServiceError> {
        let token = self.access_token().await?;
        let body = json!({
            "object_type": "INVOICE",
            "object_id": invoice_id,
            "offset": { "page_number": 1, "page_limit": 100 },
        });

        let resp = self
            .http
            .post(self.url("/v2/payment/check"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let check: CheckResponse = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(ServiceError::transport(SERVICE))?;

        Ok(check.rows.iter().any(|r| r.payment_status == "PAID"))
    }

    async fn access_token(&self) -> Result<String, ServiceError> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires)) = cached.as_ref() {
            if Instant::now() < *expires {
                return Ok(token.clone());
            }
        }

        let resp = self
            .http
            .post(self.url("/v2/auth/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let token: TokenResponse = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(ServiceError::transport(SERVICE))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_MARGIN);
        *cached = Some((token.access_token.clone(), Instant::now() + lifetime));
        debug!("Refreshed QPay access token");
        Ok(token.access_token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_ignores_extra_link_fields() {
        let invoice: QpayInvoice = serde_json::from_str(
            r#"{
                "invoice_id": "inv-1",
                "qr_text": "0002010102",
                "qr_image": "iVBOR",
                "urls": [{"name": "Khan bank", "description": "Khan bank", "logo": "https://x/logo.png", "link": "khanbank://q?qPay_QRcode=0002"}]
            }"#,
        )
        .unwrap();
        assert_eq!(invoice.invoice_id, "inv-1");
        assert_eq!(invoice.urls[0].name, "Khan bank");
        assert!(invoice.urls[0].link.starts_with("khanbank://"));
    }

    #[test]
    fn check_rows_default_empty() {
        let check: CheckResponse = serde_json::from_str(r#"{"count": 0, "paid_amount": 0}"#).unwrap();
        assert!(check.rows.is_empty());
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = QpayClient::new(
            reqwest::Client::new(),
            QpayConfig {
                base_url: "https://merchant.qpay.mn/".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
                invoice_code: "CODE".into(),
                callback_url: "https://fundbridge.mn/api/payment/qpay/callback".into(),
            },
        );
        assert_eq!(client.url("/v2/invoice"), "https://merchant.qpay.mn/v2/invoice");
    }
}
