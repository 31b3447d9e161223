use crate::Database;
use crate::models::{GoogleSignIn, NewPayment, NotificationRow, OtpCheck, PaymentRow, UserRow};
use anyhow::Result;
use fundbridge_types::models::{NotificationKind, PaymentProvider, PaymentStatus};
use rusqlite::{Connection, Row, params};
use sha2::{Digest, Sha256};

/// Wrong guesses allowed before an OTP is burned.
pub const OTP_MAX_ATTEMPTS: u32 = 5;

const USER_COLUMNS: &str = "id, email, password, name, kyc_verified, kyc_otp_verified, wallet_address, created_at";
const PAYMENT_COLUMNS: &str = "id, user_id, provider, external_id, campaign_id, amount_mnt, status, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, name) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, name),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn set_kyc_otp_verified(&self, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE users SET kyc_otp_verified = 1 WHERE id = ?1", [user_id])?;
            Ok(n > 0)
        })
    }

    pub fn set_kyc_verified(&self, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE users SET kyc_verified = 1 WHERE id = ?1", [user_id])?;
            Ok(n > 0)
        })
    }

    pub fn set_wallet_address(&self, user_id: &str, wallet: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("UPDATE users SET wallet_address = ?2 WHERE id = ?1", [user_id, wallet])?;
            Ok(n > 0)
        })
    }

    /// Finds or creates the user for a verified Google identity. Accounts
    /// created here have no password and can only sign in through Google.
    pub fn sign_in_with_google(&self, new_id: &str, sub: &str, email: &str, name: &str) -> Result<GoogleSignIn> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(row) = query_user(&tx, "google_sub", sub)? {
                return Ok(GoogleSignIn::Existing(row));
            }

            let outcome = match query_user(&tx, "email", email)? {
                Some(row) => {
                    let n = tx.execute(
                        "UPDATE users SET google_sub = ?2 WHERE id = ?1 AND google_sub IS NULL",
                        [row.id.as_str(), sub],
                    )?;
                    if n == 0 {
                        return Ok(GoogleSignIn::EmailTaken);
                    }
                    GoogleSignIn::Linked(row)
                }
                None => {
                    tx.execute(
                        "INSERT INTO users (id, email, password, name, google_sub) VALUES (?1, ?2, '', ?3, ?4)",
                        (new_id, email, name, sub),
                    )?;
                    let row = query_user(&tx, "id", new_id)?
                        .ok_or_else(|| anyhow::anyhow!("user {} missing after insert", new_id))?;
                    GoogleSignIn::Created(row)
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    // -- OTPs --

    /// Stores a fresh code for `email`, replacing any previous one and resetting attempts.
    pub fn upsert_otp(&self, email: &str, code: &str, expires_at: i64) -> Result<()> {
        let hash = hash_otp(email, code);
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO otps (email, code_hash, attempts, expires_at) VALUES (?1, ?2, 0, ?3)
                 ON CONFLICT(email) DO UPDATE SET code_hash = ?2, attempts = 0, expires_at = ?3",
                params![email, hash, expires_at],
            )?;
            Ok(())
        })
    }

    /// Checks `code` against the stored OTP. A matching code is consumed.
    pub fn verify_otp(&self, email: &str, code: &str, now: i64) -> Result<OtpCheck> {
        let hash = hash_otp(email, code);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let stored: Option<(String, u32, i64)> = tx
                .query_row(
                    "SELECT code_hash, attempts, expires_at FROM otps WHERE email = ?1",
                    [email],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((stored_hash, attempts, expires_at)) = stored else {
                return Ok(OtpCheck::Missing);
            };

            let outcome = if expires_at <= now {
                tx.execute("DELETE FROM otps WHERE email = ?1", [email])?;
                OtpCheck::Expired
            } else if stored_hash == hash {
                tx.execute("DELETE FROM otps WHERE email = ?1", [email])?;
                OtpCheck::Valid
            } else if attempts + 1 >= OTP_MAX_ATTEMPTS {
                tx.execute("DELETE FROM otps WHERE email = ?1", [email])?;
                OtpCheck::TooManyAttempts
            } else {
                tx.execute("UPDATE otps SET attempts = attempts + 1 WHERE email = ?1", [email])?;
                OtpCheck::Invalid {
                    attempts_left: OTP_MAX_ATTEMPTS - attempts - 1,
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn purge_expired_otps(&self, now: i64) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM otps WHERE expires_at <= ?1", [now])?))
    }

    // -- Notifications --

    pub fn create_notification(
        &self,
        id: &str,
        user_id: &str,
        kind: NotificationKind,
        message: &str,
        link: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, message, link) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, kind.as_str(), message, link],
            )?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn list_notifications(&self, user_id: &str, limit: u32, unread_only: bool) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, message, link, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(params![user_id, unread_only, limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        message: row.get(3)?,
                        link: row.get(4)?,
                        is_read: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Returns false when the notification does not exist or belongs to someone else.
    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id],
            )?)
        })
    }

    pub fn unread_notification_count(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    // -- Payments --

    pub fn create_payment(&self, p: &NewPayment<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO payments (id, user_id, provider, external_id, campaign_id, amount_mnt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    p.id,
                    p.user_id,
                    p.provider.as_str(),
                    p.external_id,
                    p.campaign_id.map(|id| id as i64),
                    p.amount_mnt as i64,
                ],
            )?;
            Ok(())
        })
    }

    /// Moves a provider-side payment to `status`. Returns the row only when it
    /// actually changed, so repeated provider callbacks are no-ops.
    pub fn set_payment_status(
        &self,
        provider: PaymentProvider,
        external_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRow>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE payments SET status = ?3 WHERE provider = ?1 AND external_id = ?2 AND status != ?3",
                params![provider.as_str(), external_id, status.as_str()],
            )?;
            if n == 0 {
                return Ok(None);
            }
            let sql = format!("SELECT {} FROM payments WHERE provider = ?1 AND external_id = ?2", PAYMENT_COLUMNS);
            let row = conn
                .query_row(&sql, params![provider.as_str(), external_id], payment_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_payment(&self, id: &str) -> Result<Option<PaymentRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS);
            Ok(conn.query_row(&sql, [id], payment_from_row).optional()?)
        })
    }

    pub fn list_payments(&self, user_id: &str, limit: u32) -> Result<Vec<PaymentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM payments WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                PAYMENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, limit], payment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn hash_otp(email: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.to_ascii_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                name: row.get(3)?,
                kyc_verified: row.get(4)?,
                kyc_otp_verified: row.get(5)?,
                wallet_address: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentRow> {
    Ok(PaymentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: row.get(2)?,
        external_id: row.get(3)?,
        campaign_id: row.get(4)?,
        amount_mnt: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn db_with_user() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, "saraa@example.mn", "$argon2id$fake", "Saraa").unwrap();
        (db, id)
    }

    #[test]
    fn user_lookup_is_case_insensitive() {
        let (db, id) = db_with_user();
        let row = db.get_user_by_email("SARAA@example.mn").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert!(!row.kyc_verified);

        let user = row.into_user().unwrap();
        assert_eq!(user.name, "Saraa");
        assert!(user.wallet_address.is_none());
    }

    #[test]
    fn google_sign_in_creates_then_reuses() {
        let db = Database::open_in_memory().unwrap();
        let first = Uuid::new_v4().to_string();
        let row = match db.sign_in_with_google(&first, "g-1", "oyun@gmail.com", "Oyun").unwrap() {
            GoogleSignIn::Created(row) => row,
            _ => panic!("expected a new account"),
        };
        assert_eq!(row.id, first);
        assert!(row.password.is_empty());

        match db.sign_in_with_google(&Uuid::new_v4().to_string(), "g-1", "oyun@gmail.com", "Oyun").unwrap() {
            GoogleSignIn::Existing(row) => assert_eq!(row.id, first),
            _ => panic!("expected the existing account"),
        }
    }

    #[test]
    fn google_sign_in_links_password_account_once() {
        let (db, id) = db_with_user();
        match db.sign_in_with_google(&Uuid::new_v4().to_string(), "g-2", "SARAA@example.mn", "Saraa").unwrap() {
            GoogleSignIn::Linked(row) => assert_eq!(row.id, id),
            _ => panic!("expected the password account to be linked"),
        }
        assert!(matches!(
            db.sign_in_with_google(&Uuid::new_v4().to_string(), "g-3", "saraa@example.mn", "Saraa").unwrap(),
            GoogleSignIn::EmailTaken
        ));
    }

    #[test]
    fn duplicate_email_rejected() {
        let (db, _) = db_with_user();
        let res = db.create_user(&Uuid::new_v4().to_string(), "Saraa@Example.mn", "x", "Other");
        assert!(res.is_err());
    }

    #[test]
    fn kyc_flags_and_wallet() {
        let (db, id) = db_with_user();
        assert!(db.set_kyc_otp_verified(&id).unwrap());
        assert!(db.set_kyc_verified(&id).unwrap());
        assert!(db.set_wallet_address(&id, "0xabc0000000000000000000000000000000000001").unwrap());
        assert!(!db.set_kyc_verified("missing").unwrap());

        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert!(user.kyc_otp_verified && user.kyc_verified);
        assert_eq!(user.wallet_address.as_deref(), Some("0xabc0000000000000000000000000000000000001"));
    }

    #[test]
    fn otp_valid_code_is_consumed() {
        let (db, _) = db_with_user();
        db.upsert_otp("saraa@example.mn", "123456", 1_000 + 300).unwrap();

        assert_eq!(db.verify_otp("saraa@example.mn", "123456", 1_000).unwrap(), OtpCheck::Valid);
        assert_eq!(db.verify_otp("saraa@example.mn", "123456", 1_000).unwrap(), OtpCheck::Missing);
    }

    #[test]
    fn otp_expires_after_ttl() {
        let (db, _) = db_with_user();
        db.upsert_otp("saraa@example.mn", "123456", 1_300).unwrap();
        assert_eq!(db.verify_otp("saraa@example.mn", "123456", 1_300).unwrap(), OtpCheck::Expired);
    }

    #[test]
    fn otp_attempts_are_limited() {
        let (db, _) = db_with_user();
        db.upsert_otp("saraa@example.mn", "123456", 5_000).unwrap();

        for left in (1..OTP_MAX_ATTEMPTS).rev() {
            assert_eq!(
                db.verify_otp("saraa@example.mn", "000000", 1_000).unwrap(),
                OtpCheck::Invalid { attempts_left: left }
            );
        }
        assert_eq!(db.verify_otp("saraa@example.mn", "000000", 1_000).unwrap(), OtpCheck::TooManyAttempts);
        assert_eq!(db.verify_otp("saraa@example.mn", "123456", 1_000).unwrap(), OtpCheck::Missing);
    }

    #[test]
    fn resend_resets_attempts_and_purge_removes_expired() {
        let (db, _) = db_with_user();
        db.upsert_otp("saraa@example.mn", "111111", 2_000).unwrap();
        db.verify_otp("saraa@example.mn", "000000", 1_000).unwrap();
        db.upsert_otp("saraa@example.mn", "222222", 2_000).unwrap();
        assert_eq!(
            db.verify_otp("saraa@example.mn", "000000", 1_000).unwrap(),
            OtpCheck::Invalid { attempts_left: OTP_MAX_ATTEMPTS - 1 }
        );

        db.upsert_otp("other@example.mn", "333333", 500).unwrap();
        assert_eq!(db.purge_expired_otps(1_000).unwrap(), 1);
        assert_eq!(db.verify_otp("other@example.mn", "333333", 400).unwrap(), OtpCheck::Missing);
    }

    #[test]
    fn notifications_lifecycle() {
        let (db, uid) = db_with_user();
        let first = Uuid::new_v4().to_string();
        let second = Uuid::new_v4().to_string();
        db.create_notification(&first, &uid, NotificationKind::Donation, "You received 0.1 ETH", Some("/campaigns/1"))
            .unwrap();
        db.create_notification(&second, &uid, NotificationKind::Kyc, "KYC verified", None).unwrap();

        let rows = db.list_notifications(&uid, 50, false).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second);
        assert_eq!(db.unread_notification_count(&uid).unwrap(), 2);

        assert!(db.mark_notification_read(&first, &uid).unwrap());
        assert!(!db.mark_notification_read(&first, "someone-else").unwrap());
        assert_eq!(db.list_notifications(&uid, 50, true).unwrap().len(), 1);

        assert_eq!(db.mark_all_notifications_read(&uid).unwrap(), 1);
        assert_eq!(db.unread_notification_count(&uid).unwrap(), 0);

        let n = db.list_notifications(&uid, 1, false).unwrap().remove(0).into_notification().unwrap();
        assert_eq!(n.kind, NotificationKind::Kyc);
        assert!(n.is_read);
    }

    #[test]
    fn payment_status_updates() {
        let (db, uid) = db_with_user();
        let pid = Uuid::new_v4().to_string();
        db.create_payment(&NewPayment {
            id: &pid,
            user_id: &uid,
            provider: PaymentProvider::Stripe,
            external_id: "pi_123",
            campaign_id: Some(7),
            amount_mnt: 50_000,
        })
        .unwrap();

        let updated = db
            .set_payment_status(PaymentProvider::Stripe, "pi_123", PaymentStatus::Succeeded)
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, pid);

        // Replayed callback
        assert!(db
            .set_payment_status(PaymentProvider::Stripe, "pi_123", PaymentStatus::Succeeded)
            .unwrap()
            .is_none());

        assert!(db
            .set_payment_status(PaymentProvider::Qpay, "pi_123", PaymentStatus::Succeeded)
            .unwrap()
            .is_none());

        let payments = db.list_payments(&uid, 10).unwrap();
        let payment = payments.into_iter().next().unwrap().into_payment().unwrap();
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.campaign_id, Some(7));
        assert_eq!(payment.amount_mnt, 50_000);

        let row = db.get_payment(&pid).unwrap().unwrap();
        assert_eq!(row.external_id, "pi_123");
        assert!(db.get_payment("missing").unwrap().is_none());
    }
}
