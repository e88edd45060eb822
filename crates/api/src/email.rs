//! Email notifications for credential events
//!
//! Sends transactional emails via Resend API. The reset flow only depends on the
//! [`ResetMailer`] trait; delivery mechanics stay behind it.

use async_trait::async_trait;
use std::fmt;
use time::Duration;
use uuid::Uuid;

use crate::config::Config;

const RESEND_API_BASE: &str = "https://api.resend.com";

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Resend API key; empty disables sending
    pub resend_api_key: String,
    pub email_from: String,
    pub app_name: String,
    /// Base for links inside emails
    pub public_url: String,
    /// Resend endpoint root, overridable for tests
    pub api_base: String,
}

impl EmailConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resend_api_key: config.resend_api_key.clone(),
            email_from: config.email_from.clone(),
            app_name: config.app_name.clone(),
            public_url: config.public_url.clone(),
            api_base: RESEND_API_BASE.to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }
}

/// Everything needed to deliver one reset link
#[derive(Clone)]
pub struct ResetMail {
    pub to: String,
    pub username: String,
    pub token_id: Uuid,
    pub secret: String,
    pub valid_for: Duration,
}

// The secret is a bearer credential.
impl fmt::Debug for ResetMail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetMail")
            .field("to", &self.to)
            .field("username", &self.username)
            .field("token_id", &self.token_id)
            .field("secret", &"<redacted>")
            .field("valid_for", &self.valid_for)
            .finish()
    }
}

/// Out-of-band delivery of password-reset material
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_password_reset(&self, mail: ResetMail);

    async fn send_password_changed(&self, to: &str, ip_address: Option<&str>);
}

pub fn reset_link(public_url: &str, token_id: Uuid, secret: &str) -> String {
    format!(
        "{}/reset-password?token={}&secret={}",
        public_url.trim_end_matches('/'),
        token_id,
        secret
    )
}

/// Security email notification service
#[derive(Clone)]
pub struct SecurityEmailService {
    config: EmailConfig,
    client: reqwest::Client,
}

impl SecurityEmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Send an email via Resend API
    async fn send_email(&self, to: &str, subject: &str, html: &str) {
        if !self.config.is_enabled() {
            tracing::warn!(subject = %subject, "Email not configured, skipping");
            return;
        }

        let body = serde_json::json!({
            "from": self.config.email_from,
            "to": [to],
            "subject": subject,
            "html": html
        });

        let response = self
            .client
            .post(format!("{}/emails", self.config.api_base))
            .bearer_auth(&self.config.resend_api_key)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(to = %to, subject = %subject, "Security email sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body, "Failed to send security email");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send security email");
            }
        }
    }
}

/// Escape text for interpolation into HTML element content or attributes
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_reset_email(app_name: &str, mail: &ResetMail, link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #6366f1;">Password Reset Requested</h2>
    <p>Hi {username},</p>
    <p>We received a request to reset the password of your {app_name} account.</p>
    <p style="text-align: center; margin: 30px 0;">
        <a href="{link}" style="display: inline-block; padding: 14px 28px; background-color: #6366f1; color: white; text-decoration: none; border-radius: 6px; font-weight: bold;">
            Reset Password
        </a>
    </p>
    <p style="color: #666; font-size: 14px;">This link can be used once and expires in <strong>{minutes} minutes</strong>.</p>
    <p style="color: #dc2626; font-size: 14px;">If you didn't request a reset, ignore this email and your password stays unchanged.</p>
    <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
    <p style="color: #999; font-size: 12px;">{app_name}</p>
</body>
</html>"#,
        username = escape_html(&mail.username),
        app_name = escape_html(app_name),
        link = escape_html(link),
        minutes = mail.valid_for.whole_minutes(),
    )
}

fn render_password_changed_email(app_name: &str, ip_address: Option<&str>) -> String {
    let ip_info = ip_address
        .map(|ip| {
            format!(
                "<p style=\"color: #666; font-size: 14px;\">IP Address: {}</p>",
                escape_html(ip)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #059669;">Password Changed</h2>
    <p>The password of your {app_name} account was changed through a reset link.</p>
    {ip_info}
    <p style="color: #dc2626; font-size: 14px; font-weight: bold;">If you didn't make this change, request a new reset immediately.</p>
    <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
    <p style="color: #999; font-size: 12px;">{app_name}</p>
</body>
</html>"#,
        app_name = escape_html(app_name),
        ip_info = ip_info,
    )
}

#[async_trait]
impl ResetMailer for SecurityEmailService {
    async fn send_password_reset(&self, mail: ResetMail) {
        let link = reset_link(&self.config.public_url, mail.token_id, &mail.secret);
        let html = render_reset_email(&self.config.app_name, &mail, &link);

        self.send_email(
            &mail.to,
            &format!("Password Reset - {}", self.config.app_name),
            &html,
        )
        .await;
    }

    async fn send_password_changed(&self, to: &str, ip_address: Option<&str>) {
        let html = render_password_changed_email(&self.config.app_name, ip_address);
        self.send_email(to, &format!("Password Changed - {}", self.config.app_name), &html)
            .await;
    }
}
