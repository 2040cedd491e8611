use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_sesv2::{
    config::Region,
    types::{Body, Content, Destination, EmailContent, Message},
    Client,
};
use axum::async_trait;
use tracing::info;

/// Outbound mail. Two message types: share notifications and OTP codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_share_notification(
        &self,
        sender_name: &str,
        recipient_email: &str,
        document_title: &str,
        permissions: &[String],
        download_url: &str,
    ) -> anyhow::Result<()>;

    async fn send_otp_email(&self, recipient_email: &str, code: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SesMailer {
    client: Client,
    from: String,
}

impl SesMailer {
    pub async fn new(
        region: &str,
        access_key: &str,
        secret_key: &str,
        from_address: &str,
        from_name: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .load()
            .await;

        Ok(Self {
            client: Client::new(&shared),
            from: format!("\"{}\" <{}>", from_name, from_address),
        })
    }

    async fn send_html(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let subject = Content::builder()
            .data(subject)
            .build()
            .context("build subject")?;
        let body = Content::builder().data(html).build().context("build body")?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().html(body).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .context("ses send_email")?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send_share_notification(
        &self,
        sender_name: &str,
        recipient_email: &str,
        document_title: &str,
        permissions: &[String],
        download_url: &str,
    ) -> anyhow::Result<()> {
        let subject = format!("New Document Shared: {}", document_title);
        let html = format!(
            "<h2>Document Shared with You</h2>\
             <p><strong>{}</strong> has shared a document with you:</p>\
             <ul>\
             <li><strong>Document Title:</strong> {}</li>\
             <li><strong>Permissions:</strong> {}</li>\
             </ul>\
             <p><a href=\"{}\">Download the document</a> (link expires).</p>",
            sender_name,
            document_title,
            permissions.join(", "),
            download_url,
        );
        self.send_html(recipient_email, &subject, &html).await?;
        info!(recipient = %recipient_email, title = %document_title, "share notification sent");
        Ok(())
    }

    async fn send_otp_email(&self, recipient_email: &str, code: &str) -> anyhow::Result<()> {
        let html = format!(
            "<h3>Password Change Request</h3>\
             <p>Your OTP for password change is: <strong>{}</strong></p>\
             <p>This OTP is valid for 5 minutes.</p>",
            code,
        );
        self.send_html(recipient_email, "Password Change OTP", &html)
            .await?;
        info!(recipient = %recipient_email, "otp email sent");
        Ok(())
    }
}
