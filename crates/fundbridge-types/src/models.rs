use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of an account. The password hash never leaves the DB layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub kyc_verified: bool,
    pub kyc_otp_verified: bool,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Donation,
    Purchase,
    Campaign,
    Kyc,
    Payment,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donation => "donation",
            Self::Purchase => "purchase",
            Self::Campaign => "campaign",
            Self::Kyc => "kyc",
            Self::Payment => "payment",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "donation" => Some(Self::Donation),
            "purchase" => Some(Self::Purchase),
            "campaign" => Some(Self::Campaign),
            "kyc" => Some(Self::Kyc),
            "payment" => Some(Self::Payment),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Stripe,
    Qpay,
    Card,
    Fiat,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Qpay => "qpay",
            Self::Card => "card",
            Self::Fiat => "fiat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stripe" => Some(Self::Stripe),
            "qpay" => Some(Self::Qpay),
            "card" => Some(Self::Card),
            "fiat" => Some(Self::Fiat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: PaymentProvider,
    pub external_id: String,
    pub campaign_id: Option<u64>,
    pub amount_mnt: u64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        for kind in [
            NotificationKind::Donation,
            NotificationKind::Purchase,
            NotificationKind::Campaign,
            NotificationKind::Kyc,
            NotificationKind::Payment,
            NotificationKind::System,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(NotificationKind::parse("spam"), None);
    }

    #[test]
    fn payment_status_parse() {
        assert_eq!(PaymentStatus::parse("succeeded"), Some(PaymentStatus::Succeeded));
        assert_eq!(PaymentProvider::parse("qpay"), Some(PaymentProvider::Qpay));
        assert_eq!(PaymentProvider::parse("paypal"), None);
    }
}
