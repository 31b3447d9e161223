/// Row types read back from SQLite.
/// Distinct from fundbridge-types API models to keep the DB layer independent.
use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use fundbridge_types::models::{Notification, NotificationKind, Payment, PaymentProvider, PaymentStatus, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub kyc_verified: bool,
    pub kyc_otp_verified: bool,
    pub wallet_address: Option<String>,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

pub struct PaymentRow {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub external_id: String,
    pub campaign_id: Option<i64>,
    pub amount_mnt: i64,
    pub status: String,
    pub created_at: String,
}

pub struct NewPayment<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub provider: PaymentProvider,
    pub external_id: &'a str,
    pub campaign_id: Option<u64>,
    pub amount_mnt: u64,
}

/// Result of signing in with a Google account.
pub enum GoogleSignIn {
    /// Account already linked to this Google subject.
    Existing(UserRow),
    /// Password account with the same email, now linked.
    Linked(UserRow),
    Created(UserRow),
    /// The email belongs to an account linked to a different Google subject.
    EmailTaken,
}

/// Outcome of checking a submitted OTP code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Invalid { attempts_left: u32 },
    Expired,
    Missing,
    TooManyAttempts,
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS[.fff]" without timezone.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", s, e))
}

fn parse_id(s: &str) -> Result<Uuid> {
    s.parse().map_err(|e| anyhow!("Corrupt id '{}': {}", s, e))
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            email: self.email,
            name: self.name,
            kyc_verified: self.kyc_verified,
            kyc_otp_verified: self.kyc_otp_verified,
            wallet_address: self.wallet_address,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl NotificationRow {
    pub fn into_notification(self) -> Result<Notification> {
        Ok(Notification {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            kind: NotificationKind::parse(&self.kind)
                .ok_or_else(|| anyhow!("Unknown notification kind '{}'", self.kind))?,
            message: self.message,
            link: self.link,
            is_read: self.is_read,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl PaymentRow {
    pub fn into_payment(self) -> Result<Payment> {
        Ok(Payment {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            provider: PaymentProvider::parse(&self.provider)
                .ok_or_else(|| anyhow!("Unknown payment provider '{}'", self.provider))?,
            external_id: self.external_id,
            campaign_id: self.campaign_id.map(|id| id as u64),
            amount_mnt: self.amount_mnt as u64,
            status: PaymentStatus::parse(&self.status)
                .ok_or_else(|| anyhow!("Unknown payment status '{}'", self.status))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
