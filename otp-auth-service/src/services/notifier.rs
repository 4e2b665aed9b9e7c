use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;

/// Delivers plaintext codes to their recipient.
///
/// The code only exists in memory between generation and this call.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver_code(
        &self,
        email: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, anyhow::Error> {
        let builder = if config.tls {
            SmtpTransport::starttls_relay(&config.host)?
        } else {
            SmtpTransport::builder_dangerous(&config.host)
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)));
        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        tracing::info!(host = %config.host, port = config.port, tls = config.tls, "SMTP notifier initialized");

        Ok(Self {
            mailer: builder.build(),
            from_email: config.from_email.clone(),
        })
    }

    fn build_message(&self, email: &str, code: &str, ttl_minutes: i64) -> Result<Message, anyhow::Error> {
        let plain_body = format!(
            "Your sign-in code is {code}.\n\nIt expires in {ttl_minutes} minutes. If you did not request it, you can ignore this email."
        );
        let html_body = format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Your sign-in code</h2>
        <p style="font-size: 28px; letter-spacing: 6px;"><strong>{code}</strong></p>
        <p>It expires in {ttl_minutes} minutes.</p>
        <p>If you did not request it, you can ignore this email.</p>
    </body>
</html>"#
        );

        let message = Message::builder()
            .from(self.from_email.parse()?)
            .to(email.parse()?)
            .subject("Your sign-in code")
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn deliver_code(
        &self,
        email: &str,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        let message = self.build_message(email, code, ttl_minutes)?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&message)).await??;

        tracing::info!(to = %email, "Verification code email sent");
        Ok(())
    }
}

/// Keeps delivered codes in memory instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following delivery fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Most recent code delivered to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent.lock().ok().and_then(|sent| {
            sent.iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, code)| code.clone())
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver_code(
        &self,
        email: &str,
        code: &str,
        _ttl_minutes: i64,
    ) -> Result<(), anyhow::Error> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("delivery disabled");
        }
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("recording notifier lock poisoned"))?
            .push((email.to_string(), code.to_string()));
        tracing::debug!(to = %email, "Recorded verification code");
        Ok(())
    }
}
