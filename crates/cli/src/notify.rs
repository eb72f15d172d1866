//! Completion reports
//!
//! After all sources are processed the captured log is mailed through the
//! Mailgun HTTP API. Delivery failures are logged by the caller and never
//! change the exit status.

use crate::config::MailgunConfig;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::info;

/// Request timeout for report delivery
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a finished run's report
pub trait Notifier {
    fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Sends reports as plain-text email via Mailgun
pub struct MailgunNotifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: SecretString,
    from: String,
    to: String,
}

impl MailgunNotifier {
    pub fn new(config: &MailgunConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("baktape/{}", env!("CARGO_PKG_VERSION")))
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: messages_endpoint(&config.api_base, &config.domain),
            api_key: config.api_key.clone(),
            from: sender_address(&config.sender, &config.domain),
            to: config.mail_to.clone(),
        })
    }
}

impl Notifier for MailgunNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(self.api_key.expose_secret()))
            .form(&[
                ("from", self.from.as_str()),
                ("to", self.to.as_str()),
                ("subject", subject),
                ("text", body),
            ])
            .send()
            .context("Failed to reach Mailgun")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            anyhow::bail!("Mailgun rejected the report ({}): {}", status, detail.trim());
        }

        info!("Report sent to {}", self.to);
        Ok(())
    }
}

fn messages_endpoint(api_base: &str, domain: &str) -> String {
    format!("{}/{}/messages", api_base.trim_end_matches('/'), domain)
}

fn sender_address(sender: &str, domain: &str) -> String {
    format!("{} <noreply@{}>", sender, domain)
}
