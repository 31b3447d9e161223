use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Highest schema version `run` migrates to.
pub const LATEST: u32 = 3;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, otps, notifications)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password            TEXT NOT NULL,
                name                TEXT NOT NULL,
                kyc_verified        INTEGER NOT NULL DEFAULT 0,
                kyc_otp_verified    INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE otps (
                email       TEXT PRIMARY KEY COLLATE NOCASE,
                code_hash   TEXT NOT NULL,
                attempts    INTEGER NOT NULL DEFAULT 0,
                expires_at  INTEGER NOT NULL
            );

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL,
                message     TEXT NOT NULL,
                link        TEXT,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_notifications_user
                ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (payments, wallet address)");
        conn.execute_batch(
            "
            ALTER TABLE users ADD COLUMN wallet_address TEXT;

            CREATE TABLE payments (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                provider        TEXT NOT NULL,
                external_id     TEXT NOT NULL,
                campaign_id     INTEGER,
                amount_mnt      INTEGER NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending',
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(provider, external_id)
            );

            CREATE INDEX idx_payments_user
                ON payments(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("Running migration v3 (Google sign-in)");
        conn.execute_batch(
            "
            ALTER TABLE users ADD COLUMN google_sub TEXT;

            CREATE UNIQUE INDEX idx_users_google_sub
                ON users(google_sub) WHERE google_sub IS NOT NULL;

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
