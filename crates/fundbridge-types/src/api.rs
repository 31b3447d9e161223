use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NotificationKind, User};

// -- JWT Claims --

/// Session token claims, issued on signup/login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkWalletRequest {
    pub wallet_address: String,
}

// -- KYC --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyOtpRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct OtpSentResponse {
    pub sent: bool,
    pub expires_in_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct IdentitySessionResponse {
    pub session_id: String,
    pub client_secret: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkVerifiedRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct KycStatusResponse {
    pub kyc_otp_verified: bool,
    pub kyc_verified: bool,
}

// -- Payments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentRequest {
    /// Amount in whole tögrög.
    pub amount_mnt: u64,
    pub campaign_id: Option<u64>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_id: Uuid,
    pub intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct QpayInvoiceResponse {
    pub payment_id: Uuid,
    pub invoice_id: String,
    pub qr_text: Option<String>,
    pub qr_image: Option<String>,
    pub urls: Vec<QpayDeepLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QpayDeepLink {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentReferenceResponse {
    pub payment_id: Uuid,
    pub reference: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentConfigResponse {
    pub stripe_publishable_key: Option<String>,
    pub qpay_enabled: bool,
}

// -- IPFS --

#[derive(Debug, Serialize)]
pub struct PinResponse {
    pub cid: String,
    pub uri: String,
    pub gateway_url: String,
}

// -- Audit log --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddAuditLogRequest {
    pub action: String,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct TxHashResponse {
    pub tx_hash: String,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNotificationRequest {
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

// -- Unsigned transactions --

/// Campaign writes the user signs in their own wallet.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CampaignTxRequest {
    Create {
        title: String,
        primary_category: String,
        description: String,
        goal_eth: String,
        image_url: String,
        metadata_hash: String,
        deadline: u64,
    },
    Donate {
        campaign_id: u64,
        amount_eth: String,
        #[serde(default)]
        comment: String,
    },
    Close {
        campaign_id: u64,
    },
    Withdraw {
        campaign_id: u64,
    },
    WithdrawAll {
        campaign_id: u64,
    },
    Update {
        campaign_id: u64,
        title: String,
        primary_category: String,
        description: String,
        goal_eth: String,
        image_url: String,
        deadline: u64,
    },
    UpdateMetadataHash {
        campaign_id: u64,
        metadata_hash: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MarketplaceTxRequest {
    Create {
        title: String,
        description: String,
        price_eth: String,
        image_url: String,
        campaign_id: u64,
    },
    Buy {
        item_id: u64,
    },
    Update {
        item_id: u64,
        title: String,
        description: String,
        price_eth: String,
        image_url: String,
    },
    Deactivate {
        item_id: u64,
    },
}

/// Call data ready for `eth_sendTransaction` from a browser wallet.
#[derive(Debug, Serialize)]
pub struct TxResponse {
    pub to: String,
    pub data: String,
    /// Wei as a decimal string.
    pub value: String,
    pub value_eth: String,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub mnt_per_eth: f64,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_tx_tagged_by_action() {
        let req: CampaignTxRequest = serde_json::from_str(
            r#"{"action":"donate","campaign_id":3,"amount_eth":"0.25"}"#,
        )
        .unwrap();
        match req {
            CampaignTxRequest::Donate { campaign_id, amount_eth, comment } => {
                assert_eq!(campaign_id, 3);
                assert_eq!(amount_eth, "0.25");
                assert!(comment.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_rejected() {
        let res = serde_json::from_str::<LoginRequest>(
            r#"{"email":"a@b.mn","password":"x","admin":true}"#,
        );
        assert!(res.is_err());
    }
}
