//! Outbound mail delivery and draft template rendering.
//!
//! Drafts are written as minijinja templates and rendered once, when the draft is created, against
//! a [`DraftContext`] built from the linked contact, deal and sending account. Delivery goes through
//! lettre, over SMTP or into a directory of `.eml` files for development.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    db::models::{contacts::ContactDBResponse, deals::DealDBResponse, mail_accounts::MailAccountDBResponse},
    errors::Error,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// Who a message is sent as. Falls back to the configured default sender.
#[derive(Debug, Clone, Serialize)]
pub struct Sender {
    pub name: String,
    pub email: String,
}

impl From<&MailAccountDBResponse> for Sender {
    fn from(account: &MailAccountDBResponse) -> Self {
        Self {
            name: account.display_name.clone().unwrap_or_default(),
            email: account.email.clone(),
        }
    }
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
        })
    }

    /// The configured default sender
    pub fn default_sender(&self) -> Sender {
        Sender {
            name: self.from_name.clone(),
            email: self.from_email.clone(),
        }
    }

    /// Deliver a plain-text message.
    ///
    /// Address problems are the caller's fault (400); transport failures are [`Error::Upstream`].
    #[tracing::instrument(skip(self, sender, body), fields(from = %sender.email), err)]
    pub async fn send(&self, sender: &Sender, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = mailbox(&sender.name, &sender.email).map_err(|e| Error::bad_request(format!("Invalid sender address: {e}")))?;
        let to = to_email
            .parse::<Mailbox>()
            .map_err(|e| Error::bad_request(format!("Invalid recipient address '{to_email}': {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Upstream { message: e.to_string() })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Upstream { message: e.to_string() })?;
            }
        }

        Ok(())
    }
}

fn mailbox(name: &str, email: &str) -> Result<Mailbox, lettre::address::AddressError> {
    if name.trim().is_empty() {
        email.parse()
    } else {
        Ok(Mailbox::new(Some(name.to_string()), email.parse()?))
    }
}

/// Optional fields are omitted when empty so they render as blanks rather than `none`
#[derive(Debug, Clone, Serialize)]
pub struct ContactContext {
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&ContactDBResponse> for ContactContext {
    fn from(contact: &ContactDBResponse) -> Self {
        Self {
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone().unwrap_or_default(),
            full_name: contact.full_name(),
            email: contact.email.clone(),
            company: contact.company.clone(),
            title: contact.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DealContext {
    pub title: String,
    pub stage: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl From<&DealDBResponse> for DealContext {
    fn from(deal: &DealDBResponse) -> Self {
        Self {
            title: deal.title.clone(),
            stage: deal.stage.to_string(),
            value: deal.value.to_string(),
            tier: deal.tier.map(|t| t.to_string()),
        }
    }
}

/// Variables available to draft templates as `contact`, `deal` and `sender`.
///
/// Absent records are left out entirely, so `{{ contact.first_name }}` renders empty when the
/// draft has no contact.
#[derive(Debug, Clone, Serialize)]
pub struct DraftContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal: Option<DealContext>,
    pub sender: Sender,
}

/// Render a subject or body template. Syntax and evaluation errors are a 400.
pub fn render_template(source: &str, context: &DraftContext) -> Result<String, Error> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);

    env.render_str(source, context)
        .map_err(|e| Error::bad_request(format!("Invalid template: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    fn sender() -> Sender {
        Sender {
            name: "Ada Rep".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    #[test]
    fn test_render_with_all_records() {
        let context = DraftContext {
            contact: Some(ContactContext {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                full_name: "Grace Hopper".to_string(),
                email: Some("grace@example.com".to_string()),
                company: Some("Navy".to_string()),
                title: None,
            }),
            deal: Some(DealContext {
                title: "Compiler licences".to_string(),
                stage: "proposal".to_string(),
                value: "1200.00".to_string(),
                tier: Some("pro".to_string()),
            }),
            sender: sender(),
        };

        let rendered = render_template(
            "Hi {{ contact.first_name }}{{ contact.title }}, about {{ deal.title }} ({{ deal.value }}) - {{ sender.name }}",
            &context,
        )
        .unwrap();
        assert_eq!(rendered, "Hi Grace, about Compiler licences (1200.00) - Ada Rep");
    }

    #[test]
    fn test_missing_records_render_empty() {
        let context = DraftContext {
            contact: None,
            deal: None,
            sender: sender(),
        };

        let rendered = render_template("Hi {{ contact.first_name }}{{ deal.title }}!", &context).unwrap();
        assert_eq!(rendered, "Hi !");
    }

    #[test]
    fn test_template_syntax_error_is_bad_request() {
        let context = DraftContext {
            contact: None,
            deal: None,
            sender: sender(),
        };

        let err = render_template("Hi {{ contact.first_name", &context).unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::File {
            path: dir.path().to_string_lossy().to_string(),
        };

        let service = EmailService::new(&config).unwrap();
        service
            .send(&sender(), "buyer@example.com", "Your quote", "Numbers attached.")
            .await
            .unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let contents = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(contents.contains("Subject: Your quote"));
        assert!(contents.contains("buyer@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_bad_request() {
        let config = create_test_config();
        let service = EmailService::new(&config).unwrap();

        let err = service.send(&sender(), "not an address", "s", "b").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}
