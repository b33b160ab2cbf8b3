use crate::config::SmtpConfig;
use crate::workflows::{ActionError, EmailContent, EmailMessage, EmailSender};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

/// Sends workflow emails over SMTP.
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(smtp_config: &SmtpConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(smtp_config.username.clone(), smtp_config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_config.host)
            .port(smtp_config.port)
            .credentials(creds)
            .pool_config(PoolConfig::new().max_size(10))
            .timeout(Some(Duration::from_secs(10)))
            .build();

        let from = format!("{} <{}>", smtp_config.from_name, smtp_config.from_email).parse::<Mailbox>()?;

        Ok(Self { transport, from })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message, ActionError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| ActionError::invalid_config(format!("invalid recipient '{}': {}", message.to, e)))?;

        let html_body = render_body(&message.content, &message.variables);
        let text_body = strip_tags(&html_body);

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| ActionError::invalid_config(format!("could not build email: {}", e)))
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), ActionError> {
        let email = self.build_message(&message)?;

        match self.transport.send(email).await {
            Ok(_) => {
                info!("Email sent successfully to {}", message.to);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", message.to, e);
                Err(ActionError::collaborator("smtp", e))
            }
        }
    }
}

/// Stand-in used when SMTP is not configured. Emails are only logged.
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), ActionError> {
        let kind = match &message.content {
            EmailContent::Body(_) => "inline body",
            EmailContent::Template(id) => id.as_str(),
        };
        info!(
            to = %message.to,
            subject = %message.subject,
            "SMTP not configured, email not delivered ({})",
            kind
        );
        Ok(())
    }
}

/// Template ids are resolved by the mail provider; locally they render as a
/// short summary listing the variables so the message is still useful.
fn render_body(content: &EmailContent, variables: &Value) -> String {
    match content {
        EmailContent::Body(body) => body.clone(),
        EmailContent::Template(template_id) => {
            let mut html = format!("<p>Template: {}</p>", escape_html(template_id));
            if let Value::Object(vars) = variables {
                html.push_str("<ul>");
                for (key, value) in vars {
                    let value = match value {
                        Value::String(text) => escape_html(text),
                        other => escape_html(&other.to_string()),
                    };
                    html.push_str(&format!("<li>{}: {}</li>", escape_html(key), value));
                }
                html.push_str("</ul>");
            }
            html
        }
    }
}

/// Variables come from event contexts and must not inject markup.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
