/// Verification email delivery
///
/// Signup hands the verification link to a `Notifier` from a detached task.
/// Delivery is at most once; failures are only logged by the caller.
///
/// # Implementations
///
/// - `SmtpNotifier`: STARTTLS relay via lettre
/// - `LogNotifier`: Writes the link to the log (used when no SMTP host is set)
/// - `MemoryNotifier`: Keeps sent messages for tests

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid mail address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("Mail delivery failed: {0}")]
    Transport(String),
}

/// Delivery seam for account notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends the email-verification link to `email`
    async fn send_verification(&self, email: &str, link: &str) -> Result<(), NotifyError>;
}

/// Builds the link a user follows to verify their address
pub fn verification_link(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, token)
}

fn verification_body(link: &str) -> String {
    format!(
        "Welcome to Solfa!\n\nClick the link below to verify your account:\n{}\n",
        link
    )
}

/// Logs verification links instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        info!(email, link, "Verification email (SMTP disabled)");
        Ok(())
    }
}

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Sender address, e.g. `Solfa <no-reply@solfa.local>`
    pub from: String,
}

/// Sends mail through an SMTP relay with STARTTLS
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| NotifyError::Address(format!("{}: {}", config.from, e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.port);

        if let (Some(username), Some(password)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_verification(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        let to: Mailbox = email
            .parse()
            .map_err(|e| NotifyError::Address(format!("{}: {}", email, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("Verify your Solfa account")
            .header(ContentType::TEXT_PLAIN)
            .body(verification_body(link))
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!(email, "Sent verification email");
        Ok(())
    }
}

/// A message captured by `MemoryNotifier`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub email: String,
    pub link: String,
}

/// Records messages instead of sending them
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<SentMessage>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_verification(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                email: email.to_string(),
                link: link.to_string(),
            });
        Ok(())
    }
}
