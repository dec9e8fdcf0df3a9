// src/services/mailer.rs
use crate::config::{Config, SmtpConfig};
use crate::models::ServiceError;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn otp(to: &str, otp: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your Statroom verification code".to_string(),
            body: format!(
                "Your Statroom verification code is {}. It expires in 10 minutes.\n\
                 If you did not request this code you can ignore this email.",
                otp
            ),
        }
    }

    pub fn team_invite(to: &str, sender: &str, team_name: &str, link: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("You have been invited to join {} on Statroom", team_name),
            body: format!(
                "{} invited you to join the team {}.\n\
                 Accept the invitation within 7 days: {}",
                sender, team_name, link
            ),
        }
    }
}

#[async_trait::async_trait]
pub trait MailClient: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError>;
}

pub type DynMailClient = Arc<dyn MailClient>;

// SMTP when configured, otherwise the logging outbox
pub fn create_mail_client(config: &Config) -> Result<DynMailClient, ServiceError> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailClient::new(smtp, &config.mail_from)?)),
        None => Ok(Arc::new(OutboxMailClient::default())),
    }
}

pub struct SmtpMailClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailClient {
    pub fn new(smtp: &SmtpConfig, from: &str) -> Result<Self, ServiceError> {
        let credentials = Credentials::new(smtp.username.clone(), smtp.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .map_err(|e| {
                error!("❌ Failed to create SMTP transport: {}", e);
                ServiceError::InternalServerError
            })?
            .port(smtp.port)
            .credentials(credentials)
            .build();

        info!("📮 SMTP relay configured: {}:{}", smtp.host, smtp.port);
        Ok(Self {
            transport,
            from: from.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl MailClient for SmtpMailClient {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        let from = self.from.parse().map_err(|e| {
            error!("❌ Invalid from address {}: {}", self.from, e);
            ServiceError::InternalServerError
        })?;
        let to = message.to.parse().map_err(|e| {
            error!("❌ Invalid recipient address {}: {}", message.to, e);
            ServiceError::BadRequest("Invalid email address".to_string())
        })?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|e| {
                error!("❌ Failed to build email: {}", e);
                ServiceError::InternalServerError
            })?;

        self.transport.send(email).await.map_err(|e| {
            error!("❌ Failed to send email via SMTP: {}", e);
            ServiceError::Upstream("mail".to_string())
        })?;

        info!("📧 Sent \"{}\" to {}", message.subject, message.to);
        Ok(())
    }
}

/// Keeps every message in memory and logs it instead of delivering it.
#[derive(Default)]
pub struct OutboxMailClient {
    sent: Mutex<Vec<EmailMessage>>,
}

impl OutboxMailClient {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, recipient: &str) -> Option<EmailMessage> {
        self.messages().into_iter().rev().find(|m| m.to == recipient)
    }
}

#[async_trait::async_trait]
impl MailClient for OutboxMailClient {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        info!("📭 Outbox mail to {}: {}", message.to, message.subject);
        self.sent
            .lock()
            .map_err(|_| ServiceError::InternalServerError)?
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn outbox_records_messages_in_order() {
        let outbox = OutboxMailClient::default();
        outbox.send(EmailMessage::otp("a@x.com", "111111")).await.unwrap();
        outbox.send(EmailMessage::otp("a@x.com", "222222")).await.unwrap();

        assert_eq!(outbox.messages().len(), 2);
        assert!(outbox.last_to("a@x.com").unwrap().body.contains("222222"));
        assert!(outbox.last_to("b@x.com").is_none());
    }
}
