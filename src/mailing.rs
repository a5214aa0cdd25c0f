use std::sync::Arc;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::{smtp::authentication::Credentials, stub::AsyncStubTransport},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::{Config, Env},
    errors::AppError,
    log_and_wrap_custom_internal,
};

#[derive(Clone)]
pub enum Mailer {
    Smtp(Arc<AsyncSmtpTransport<Tokio1Executor>>),
    /// Keeps every message in memory, used when running the tests.
    Stub(AsyncStubTransport),
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Smtp(_) => write!(f, "Mailer::Smtp"),
            Self::Stub(_) => write!(f, "Mailer::Stub"),
        }
    }
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        match config.env {
            Env::Test => Ok(Self::Stub(AsyncStubTransport::new_ok())),
            Env::Development => {
                let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("0.0.0.0")
                    .port(1025)
                    .build();
                Ok(Self::Smtp(Arc::new(mailer)))
            }
            Env::Production => {
                let creds =
                    Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
                let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_relay)
                    .map_err(|e| log_and_wrap_custom_internal!(e))?
                    .credentials(creds)
                    .build();
                Ok(Self::Smtp(Arc::new(mailer)))
            }
        }
    }

    pub async fn send(&self, message: &Message) -> Result<(), AppError> {
        let raw = message.formatted();
        let envelope = message.envelope();
        match self {
            Self::Smtp(transport) => transport
                .send_raw(envelope, &raw)
                .await
                .map(|_| ())
                .map_err(|e| log_and_wrap_custom_internal!(e)),
            Self::Stub(transport) => transport
                .send_raw(envelope, &raw)
                .await
                .map_err(|e| log_and_wrap_custom_internal!(e)),
        }
    }

    pub async fn notify(
        &self,
        config: &Config,
        to: &str,
        notification: Notification,
    ) -> Result<(), AppError> {
        let message = notification.to_message(&config.email_default_sender, to)?;
        self.send(&message).await?;
        tracing::info!(to, subject = notification.subject(), "notification sent");
        Ok(())
    }

    /// Raw messages recorded by the stub transport, oldest first.
    pub async fn sent_messages(&self) -> Vec<String> {
        match self {
            Self::Smtp(_) => Vec::new(),
            Self::Stub(transport) => transport
                .messages()
                .await
                .into_iter()
                .map(|(_, raw)| raw)
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Notification {
    Activation { username: String, link: String },
    RsvpConfirmation { username: String, event_name: String },
    PasswordReset { username: String, link: String },
}

impl Notification {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Activation { .. } => "Activate your account",
            Self::RsvpConfirmation { .. } => "RSVP confirmation",
            Self::PasswordReset { .. } => "Reset your password",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Self::Activation { username, link } => format!(
                "Hi {},\n\nPlease click the following link to activate your account:\n{}",
                username, link
            ),
            Self::RsvpConfirmation {
                username,
                event_name,
            } => format!(
                "Hi {},\n\nYou have successfully RSVPed to {}.",
                username, event_name
            ),
            Self::PasswordReset { username, link } => format!(
                "Hi {},\n\nUse the following link to choose a new password:\n{}\nThe link expires in 24 hours.",
                username, link
            ),
        }
    }

    fn to_message(&self, from: &str, to: &str) -> Result<Message, AppError> {
        let from: Mailbox = from.parse().map_err(|e: lettre::address::AddressError| log_and_wrap_custom_internal!(e))?;
        let to: Mailbox = to
            .parse()
            .map_err(|_| AppError::validation(format!("'{}' is not a valid address", to)))?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body())
            .map_err(|e| log_and_wrap_custom_internal!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsvp_body_names_the_event() {
        let notification = Notification::RsvpConfirmation {
            username: "ana".into(),
            event_name: "Tech Talk".into(),
        };
        assert!(notification
            .body()
            .contains("You have successfully RSVPed to Tech Talk."));
    }

    #[test]
    fn test_message_rejects_bad_recipient() {
        let notification = Notification::Activation {
            username: "ana".into(),
            link: "http://localhost:8000/user/activate/x".into(),
        };
        assert!(matches!(
            notification.to_message("events@example.com", "not an email"),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_stub_mailer_records_messages() {
        let config = Config::stub();
        let mailer = Mailer::new(&config).unwrap();
        mailer
            .notify(
                &config,
                "ana@example.com",
                Notification::PasswordReset {
                    username: "ana".into(),
                    link: "http://localhost:8000/user/password-reset/abc".into(),
                },
            )
            .await
            .unwrap();

        let sent = mailer.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Subject: Reset your password"));
        assert!(sent[0].contains("ana@example.com"));
    }
}
