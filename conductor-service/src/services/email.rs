use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::models::ProjectRole;

/// Invitation to join a project team.
#[derive(Debug, Clone)]
pub struct InvitationEmail {
    pub to: String,
    pub project_title: String,
    pub sender_name: String,
    pub role: ProjectRole,
    pub invite_id: String,
    pub token: String,
    pub link: String,
    pub expires_at: DateTime<Utc>,
}

/// Notice to the existing team that someone joined.
#[derive(Debug, Clone)]
pub struct TeamJoinedEmail {
    pub to: Vec<String>,
    pub project_title: String,
    pub member_name: String,
    pub role: ProjectRole,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_project_invitation(&self, email: &InvitationEmail) -> Result<(), anyhow::Error>;

    async fn send_team_joined(&self, email: &TeamJoinedEmail) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, anyhow::Error> {
        let builder = if config.user.is_empty() {
            // Local relay without TLS or auth (development mail catchers).
            SmtpTransport::builder_dangerous(&config.host)
        } else {
            let creds = Credentials::new(
                config.user.clone(),
                config.password.expose_secret().clone(),
            );
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| anyhow::anyhow!("Invalid SMTP relay {}: {}", config.host, e))?
                .credentials(creds)
        };

        let mailer = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, port = config.port, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
        })
    }

    async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        plain_body: String,
        html_body: String,
    ) -> Result<(), anyhow::Error> {
        let mut builder = Message::builder()
            .from(self.from_email.parse()?)
            .subject(subject);
        for recipient in to {
            builder = builder.to(recipient.parse()?);
        }

        let email = builder.multipart(
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

        // SmtpTransport is blocking.
        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&email)).await??;

        tracing::info!(recipients = to.len(), subject = %subject, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_project_invitation(&self, email: &InvitationEmail) -> Result<(), anyhow::Error> {
        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>You're invited to join {title}</h2>
        <p>{sender} invited you to join <strong>{title}</strong> on Conductor as a {role}.</p>
        <p>
            <a href="{link}" style="background-color: #127BC4; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                View Invitation
            </a>
        </p>
        <p style="color: #666; font-size: 12px;">This invitation expires on {expires}.</p>
    </body>
</html>"###,
            title = email.project_title,
            sender = email.sender_name,
            role = email.role,
            link = email.link,
            expires = email.expires_at.format("%B %-d, %Y"),
        );

        let plain_body = format!(
            "{sender} invited you to join {title} on Conductor as a {role}.\n\nView the invitation: {link}\n\nThis invitation expires on {expires}.",
            sender = email.sender_name,
            title = email.project_title,
            role = email.role,
            link = email.link,
            expires = email.expires_at.format("%B %-d, %Y"),
        );

        self.send_email(
            std::slice::from_ref(&email.to),
            &format!("Invitation to join {}", email.project_title),
            plain_body,
            html_body,
        )
        .await
    }

    async fn send_team_joined(&self, email: &TeamJoinedEmail) -> Result<(), anyhow::Error> {
        if email.to.is_empty() {
            return Ok(());
        }

        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <p><strong>{member}</strong> joined <strong>{title}</strong> as a {role}.</p>
    </body>
</html>"###,
            member = email.member_name,
            title = email.project_title,
            role = email.role,
        );
        let plain_body = format!(
            "{} joined {} as a {}.",
            email.member_name, email.project_title, email.role
        );

        self.send_email(
            &email.to,
            &format!("New team member on {}", email.project_title),
            plain_body,
            html_body,
        )
        .await
    }
}

/// Records messages instead of sending them.
#[derive(Default)]
pub struct MockEmailService {
    invitations: Mutex<Vec<InvitationEmail>>,
    team_notices: Mutex<Vec<TeamJoinedEmail>>,
    fail: AtomicBool,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn invitations(&self) -> Vec<InvitationEmail> {
        self.invitations
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn team_notices(&self) -> Vec<TeamJoinedEmail> {
        self.team_notices
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn check_failure(&self) -> Result<(), anyhow::Error> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("Mock SMTP failure");
        }
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_project_invitation(&self, email: &InvitationEmail) -> Result<(), anyhow::Error> {
        self.check_failure()?;
        self.invitations
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock email mutex poisoned: {}", e))?
            .push(email.clone());
        Ok(())
    }

    async fn send_team_joined(&self, email: &TeamJoinedEmail) -> Result<(), anyhow::Error> {
        self.check_failure()?;
        self.team_notices
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock email mutex poisoned: {}", e))?
            .push(email.clone());
        Ok(())
    }
}
