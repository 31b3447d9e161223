use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use fundbridge_api::google::GoogleConfig;
use fundbridge_api::mailer::SmtpSettings;
use fundbridge_api::qpay::QpayConfig;
use fundbridge_chain::{ContractAddresses, LocalSigner};
use fundbridge_core::currency::{DEFAULT_MNT_PER_ETH, MntRate};
use fundbridge_core::ipfs::DEFAULT_GATEWAY;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
    "secret",
];

pub struct StripeSettings {
    pub secret_key: String,
    pub publishable_key: Option<String>,
    pub webhook_secret: Option<String>,
}

pub struct PinataSettings {
    pub api_key: String,
    pub secret_api_key: String,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub rpc_url: String,
    pub contracts: ContractAddresses,
    /// Signs audit log writes.
    pub signer: Option<LocalSigner>,
    pub request_timeout: Duration,
    pub mnt_per_eth: MntRate,
    pub rate_url: Option<String>,
    pub rate_poll: Duration,
    pub otp_ttl_secs: i64,
    pub email_from: String,
    pub smtp: Option<SmtpSettings>,
    pub ipfs_gateway: String,
    pub stripe: Option<StripeSettings>,
    pub pinata: Option<PinataSettings>,
    pub qpay: Option<QpayConfig>,
    pub google: Option<GoogleConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> anyhow::Result<u64> {
            match get(key) {
                Some(v) => v.parse().with_context(|| format!("{} must be a whole number, got '{}'", key, v)),
                None => Ok(default),
            }
        };

        let jwt_secret = get("FUNDBRIDGE_JWT_SECRET")
            .or_else(|| get("NEXTAUTH_SECRET"))
            .unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FUNDBRIDGE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = or("FUNDBRIDGE_HOST", "0.0.0.0");
        let port: u16 = or("FUNDBRIDGE_PORT", "3000")
            .parse()
            .context("FUNDBRIDGE_PORT must be a port number")?;

        let mnt_per_eth = match get("MNT_PER_ETH") {
            Some(v) => {
                let raw: f64 = v.parse().with_context(|| format!("MNT_PER_ETH must be a number, got '{}'", v))?;
                MntRate::new(raw).context("MNT_PER_ETH")?
            }
            None => MntRate::new(DEFAULT_MNT_PER_ETH)?,
        };

        let defaults = ContractAddresses::default();
        let contracts = ContractAddresses {
            fundraising: get("FUNDRAISING_ADDRESS").unwrap_or(defaults.fundraising),
            marketplace: get("MARKETPLACE_ADDRESS").unwrap_or(defaults.marketplace),
            audit_log: get("AUDIT_LOG_ADDRESS").unwrap_or(defaults.audit_log),
        };

        let stripe = get("STRIPE_SECRET_KEY").map(|secret_key| StripeSettings {
            secret_key,
            publishable_key: get("STRIPE_PUBLISHABLE_KEY"),
            webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
        });

        let pinata = match (get("PINATA_API_KEY"), get("PINATA_SECRET_API_KEY")) {
            (Some(api_key), Some(secret_api_key)) => Some(PinataSettings { api_key, secret_api_key }),
            (None, None) => None,
            _ => bail!("PINATA_API_KEY and PINATA_SECRET_API_KEY must be set together"),
        };

        let public_url = or("FUNDBRIDGE_PUBLIC_URL", &format!("http://localhost:{}", port));
        let qpay = match (get("QPAY_CLIENT_ID"), get("QPAY_CLIENT_SECRET"), get("QPAY_INVOICE_CODE")) {
            (Some(client_id), Some(client_secret), Some(invoice_code)) => Some(QpayConfig {
                base_url: or("QPAY_BASE_URL", "https://merchant.qpay.mn"),
                client_id,
                client_secret,
                invoice_code,
                callback_url: format!("{}/api/payment/qpay/callback", public_url.trim_end_matches('/')),
            }),
            (None, None, None) => None,
            _ => bail!("QPAY_CLIENT_ID, QPAY_CLIENT_SECRET and QPAY_INVOICE_CODE must be set together"),
        };

        let signer = get("PRIVATE_KEY")
            .map(|key| LocalSigner::from_hex(&key))
            .transpose()
            .context("PRIVATE_KEY")?;

        let email_from = get("EMAIL_FROM");
        let smtp = match (get("EMAIL_USER"), get("EMAIL_PASS")) {
            (Some(username), Some(password)) => Some(SmtpSettings {
                host: or("EMAIL_HOST", "smtp.gmail.com"),
                port: or("EMAIL_PORT", "587")
                    .parse()
                    .context("EMAIL_PORT must be a port number")?,
                from: email_from.clone().unwrap_or_else(|| username.clone()),
                username,
                password,
            }),
            (None, None) => None,
            _ => bail!("EMAIL_USER and EMAIL_PASS must be set together"),
        };

        let google = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url: or(
                    "GOOGLE_REDIRECT_URL",
                    &format!("{}/api/auth/google/callback", public_url.trim_end_matches('/')),
                ),
            }),
            (None, None) => None,
            _ => bail!("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set together"),
        };

        Ok(Self {
            host,
            port,
            public_url,
            db_path: or("FUNDBRIDGE_DB_PATH", "fundbridge.db").into(),
            jwt_secret,
            rpc_url: or("SEPOLIA_URL", "http://127.0.0.1:8545"),
            contracts,
            signer,
            request_timeout: Duration::from_secs(number("RPC_TIMEOUT_SECS", 15)?.max(1)),
            mnt_per_eth,
            rate_url: get("ETH_RATE_URL"),
            rate_poll: Duration::from_secs(number("RATE_POLL_SECS", 300)?.max(10)),
            otp_ttl_secs: number("OTP_TTL_SECS", 300)? as i64,
            email_from: email_from.unwrap_or_else(|| "no-reply@fundbridge.local".to_string()),
            smtp,
            ipfs_gateway: or("PINATA_GATEWAY", DEFAULT_GATEWAY),
            stripe,
            pinata,
            qpay,
            google,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_with_only_a_secret() {
        let c = config(&[("FUNDBRIDGE_JWT_SECRET", "a-long-random-value")]).unwrap();
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.port, 3000);
        assert_eq!(c.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(c.mnt_per_eth.get(), DEFAULT_MNT_PER_ETH);
        assert_eq!(c.request_timeout, Duration::from_secs(15));
        assert_eq!(c.otp_ttl_secs, 300);
        assert_eq!(c.ipfs_gateway, DEFAULT_GATEWAY);
        assert!(c.stripe.is_none() && c.pinata.is_none() && c.qpay.is_none());
        assert!(c.signer.is_none() && c.smtp.is_none() && c.google.is_none());
    }

    #[test]
    fn zero_timeout_is_raised_to_one_second() {
        let c = config(&[("FUNDBRIDGE_JWT_SECRET", "a-long-random-value"), ("RPC_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(c.request_timeout, Duration::from_secs(1));
    }

    #[test]
    fn private_key_is_parsed_at_startup() {
        let base = ("FUNDBRIDGE_JWT_SECRET", "a-long-random-value");
        assert!(config(&[base, ("PRIVATE_KEY", "0xnot-a-key")]).is_err());

        let c = config(&[
            base,
            ("PRIVATE_KEY", "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
        ])
        .unwrap();
        let signer = c.signer.unwrap();
        assert_eq!(
            fundbridge_core::token::format_address(&signer.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn smtp_needs_user_and_password() {
        let base = ("FUNDBRIDGE_JWT_SECRET", "a-long-random-value");
        assert!(config(&[base, ("EMAIL_USER", "mailer@gmail.com")]).is_err());
        assert!(config(&[base, ("EMAIL_USER", "u"), ("EMAIL_PASS", "p"), ("EMAIL_PORT", "smtp")]).is_err());

        let c = config(&[base, ("EMAIL_USER", "mailer@gmail.com"), ("EMAIL_PASS", "app-password")]).unwrap();
        let smtp = c.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.gmail.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from, "mailer@gmail.com");

        let c = config(&[
            base,
            ("EMAIL_USER", "mailer@gmail.com"),
            ("EMAIL_PASS", "app-password"),
            ("EMAIL_FROM", "FundBridge <no-reply@fundbridge.mn>"),
            ("EMAIL_HOST", "smtp.fundbridge.mn"),
            ("EMAIL_PORT", "465"),
        ])
        .unwrap();
        let smtp = c.smtp.unwrap();
        assert_eq!(smtp.from, "FundBridge <no-reply@fundbridge.mn>");
        assert_eq!((smtp.host.as_str(), smtp.port), ("smtp.fundbridge.mn", 465));
        assert_eq!(c.email_from, "FundBridge <no-reply@fundbridge.mn>");
    }

    #[test]
    fn google_redirect_defaults_to_public_url() {
        let base = ("FUNDBRIDGE_JWT_SECRET", "a-long-random-value");
        assert!(config(&[base, ("GOOGLE_CLIENT_ID", "id")]).is_err());

        let c = config(&[
            base,
            ("FUNDBRIDGE_PUBLIC_URL", "https://fundbridge.mn/"),
            ("GOOGLE_CLIENT_ID", "id.apps.googleusercontent.com"),
            ("GOOGLE_CLIENT_SECRET", "s"),
        ])
        .unwrap();
        let google = c.google.unwrap();
        assert_eq!(google.redirect_url, "https://fundbridge.mn/api/auth/google/callback");
    }

    #[test]
    fn rejects_missing_or_placeholder_secret() {
        assert!(config(&[]).is_err());
        assert!(config(&[("FUNDBRIDGE_JWT_SECRET", "dev-secret-change-me")]).is_err());
        assert!(config(&[("FUNDBRIDGE_JWT_SECRET", "   ")]).is_err());
    }

    #[test]
    fn falls_back_to_nextauth_secret() {
        let c = config(&[("NEXTAUTH_SECRET", "from-nextauth")]).unwrap();
        assert_eq!(c.jwt_secret, "from-nextauth");
    }

    #[test]
    fn validates_rate() {
        let base = ("FUNDBRIDGE_JWT_SECRET", "a-long-random-value");
        assert!(config(&[base, ("MNT_PER_ETH", "abc")]).is_err());
        assert!(config(&[base, ("MNT_PER_ETH", "0")]).is_err());
        let c = config(&[base, ("MNT_PER_ETH", "11850000")]).unwrap();
        assert_eq!(c.mnt_per_eth.get(), 11_850_000.0);
    }

    #[test]
    fn services_need_complete_credentials() {
        let base = ("FUNDBRIDGE_JWT_SECRET", "a-long-random-value");
        assert!(config(&[base, ("PINATA_API_KEY", "k")]).is_err());
        assert!(config(&[base, ("QPAY_CLIENT_ID", "id"), ("QPAY_CLIENT_SECRET", "s")]).is_err());

        let c = config(&[
            base,
            ("FUNDBRIDGE_PUBLIC_URL", "https://fundbridge.mn/"),
            ("QPAY_CLIENT_ID", "id"),
            ("QPAY_CLIENT_SECRET", "s"),
            ("QPAY_INVOICE_CODE", "FUNDBRIDGE_INVOICE"),
            ("STRIPE_SECRET_KEY", "sk_test_1"),
        ])
        .unwrap();
        let qpay = c.qpay.unwrap();
        assert_eq!(qpay.callback_url, "https://fundbridge.mn/api/payment/qpay/callback");
        assert_eq!(qpay.base_url, "https://merchant.qpay.mn");
        let stripe = c.stripe.unwrap();
        assert!(stripe.publishable_key.is_none());
    }
}
