// src/services/notifier.rs

//! Delivery of change reports.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{FetchConfig, NotifyConfig};
use crate::utils::http::create_async_client;

/// Delivers an aggregated change report.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the report; `lines` is never empty.
    async fn notify(&self, lines: &[String]) -> Result<()>;
}

/// Writes the report to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, lines: &[String]) -> Result<()> {
        log::info!("Site changes detected:");
        for line in lines {
            log::info!("    {}", line);
        }
        Ok(())
    }
}

/// Message posted by [`WebhookNotifier`].
#[derive(Debug, Serialize)]
pub struct ReportMessage<'a> {
    pub subject: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub body: String,
}

/// Posts the report as JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    config: NotifyConfig,
}

impl WebhookNotifier {
    pub fn new(config: NotifyConfig, fetch: &FetchConfig) -> Result<Self> {
        if config.webhook().is_none() {
            return Err(AppError::config("notify.webhook_url is empty"));
        }
        Ok(Self {
            client: create_async_client(fetch)?,
            config,
        })
    }

    /// The message that would be posted for `lines`.
    pub fn message(&self, lines: &[String]) -> ReportMessage<'_> {
        ReportMessage {
            subject: &self.config.subject,
            from: &self.config.from,
            to: &self.config.to,
            body: lines.join("\n"),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, lines: &[String]) -> Result<()> {
        let Some(endpoint) = self.config.webhook() else {
            return Err(AppError::config("notify.webhook_url is empty"));
        };

        let response = self
            .client
            .post(endpoint)
            .json(&self.message(lines))
            .send()
            .await
            .map_err(AppError::notify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::notify(format!(
                "webhook {} answered {}",
                endpoint,
                status.as_u16()
            )));
        }

        log::info!("Change report sent to {}", self.config.to);
        Ok(())
    }
}

/// Pick the notifier matching the configuration.
pub fn build_notifier(config: &NotifyConfig, fetch: &FetchConfig) -> Result<Box<dyn Notifier>> {
    if config.webhook().is_some() {
        Ok(Box::new(WebhookNotifier::new(config.clone(), fetch)?))
    } else {
        Ok(Box::new(LogNotifier))
    }
}
