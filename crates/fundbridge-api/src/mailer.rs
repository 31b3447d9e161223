use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// Port that speaks TLS from the first byte; anything else upgrades with STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Outbound mail for one-time codes.
pub trait Mailer: Send + Sync {
    fn send_otp<'a>(&'a self, to: &'a str, code: &'a str, ttl_secs: i64) -> SendFuture<'a>;
}

pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Delivers codes through an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> anyhow::Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .with_context(|| format!("invalid sender address '{}'", settings.from))?;

        let builder = if settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
        };
        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .build();

        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    fn send_otp<'a>(&'a self, to: &'a str, code: &'a str, ttl_secs: i64) -> SendFuture<'a> {
        Box::pin(async move {
            let message = otp_message(&self.from, to, code, ttl_secs)?;
            self.transport.send(message).await.context("SMTP delivery failed")?;
            info!(to, "Verification code sent");
            Ok(())
        })
    }
}

/// Development fallback: writes the message to the log instead of delivering it.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send_otp<'a>(&'a self, to: &'a str, code: &'a str, ttl_secs: i64) -> SendFuture<'a> {
        Box::pin(async move {
            info!(from = %self.from, to, "Not delivering verification code (valid {}s), SMTP is off", ttl_secs);
            debug!(to, code, "Verification code");
            Ok(())
        })
    }
}

pub fn otp_message(from: &Mailbox, to: &str, code: &str, ttl_secs: i64) -> anyhow::Result<Message> {
    let recipient: Mailbox = to
        .parse()
        .with_context(|| format!("invalid recipient address '{}'", to))?;
    let minutes = (ttl_secs + 59) / 60;

    let message = Message::builder()
        .from(from.clone())
        .to(recipient)
        .subject("Your FundBridge verification code")
        .header(ContentType::TEXT_PLAIN)
        .body(format!(
            "Your FundBridge verification code is {}.\n\n\
             It expires in {} minute(s). If you did not ask for it, you can ignore this email.\n",
            code, minutes
        ))?;
    Ok(message)
}
