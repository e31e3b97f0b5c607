//! Failure notifications over SMTP.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, instrument};

use crate::core::types::CommandFailed;
use crate::io::build_log::rule;
use crate::io::config::EmailConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// A plain-text email describing a failed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub body: String,
}

impl FailureNotice {
    pub fn new(email: &EmailConfig, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            from: email.from.clone(),
            to: email.to.clone(),
            body: body.into(),
        }
    }

    /// Notice for a failed command of `task` in the named environment.
    pub fn for_failure(
        email: &EmailConfig,
        task: &str,
        name: &str,
        project_path: &Path,
        failure: &CommandFailed,
    ) -> Self {
        let body = [
            failure.to_string(),
            format!("{name} ({})", project_path.display()),
            format!("{}\nstdout:", rule()),
            failure.stdout.clone(),
            format!("{}\nstderr:", rule()),
            failure.stderr.clone(),
        ]
        .join("\n\n");
        Self::new(email, format!("{task} failed: ({name})"), body)
    }
}

pub trait Mailer {
    fn send(&self, notice: &FailureNotice) -> Result<()>;
}

/// Delivers notices through an SMTP submission server with STARTTLS.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    email: EmailConfig,
}

impl SmtpMailer {
    pub fn new(email: EmailConfig) -> Self {
        Self { email }
    }

    pub fn build_message(notice: &FailureNotice) -> Result<Message> {
        let from: Mailbox = notice
            .from
            .parse()
            .with_context(|| format!("parse sender address {:?}", notice.from))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(notice.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &notice.to {
            let mailbox: Mailbox = recipient
                .parse()
                .with_context(|| format!("parse recipient address {recipient:?}"))?;
            builder = builder.to(mailbox);
        }
        builder
            .body(notice.body.clone())
            .context("build email message")
    }
}

impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(host = %self.email.host, port = self.email.port))]
    fn send(&self, notice: &FailureNotice) -> Result<()> {
        let message = Self::build_message(notice)?;
        let transport = SmtpTransport::starttls_relay(&self.email.host)
            .with_context(|| format!("configure smtp relay {}", self.email.host))?
            .port(self.email.port)
            .credentials(Credentials::new(
                self.email.user.clone(),
                self.email.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        transport.send(&message).context("send email")?;
        debug!(recipients = notice.to.len(), "failure notice sent");
        Ok(())
    }
}
