use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use crate::error::NotifyError;
use crate::model::Report;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Outbound text transport.
pub(crate) trait MessageSink {
    async fn send_text(&self, destination: &str, body: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramSink {
    client: Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramSink {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        Self::with_api_base(TELEGRAM_API, token, timeout)
    }

    pub fn with_api_base(api_base: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create Telegram client")?;
        Ok(TelegramSink {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

impl MessageSink for TelegramSink {
    async fn send_text(&self, destination: &str, body: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "chat_id": destination, "text": body }))
            .send()
            .await?;

        let status = response.status();
        let reply: Option<TelegramResponse> = response.json().await.ok();
        match reply {
            Some(r) if status.is_success() && r.ok => Ok(()),
            reply => Err(NotifyError::Rejected {
                status,
                description: reply
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

/// Logs messages instead of delivering them. Used when no bot is configured.
pub struct LogSink;

impl MessageSink for LogSink {
    async fn send_text(&self, destination: &str, body: &str) -> Result<(), NotifyError> {
        info!(destination, "Report:\n{}", body);
        Ok(())
    }
}

/// Result of one notify call.
#[derive(Debug)]
pub struct Delivery {
    pub sent: bool,
    /// Baseline for the next comparison.
    pub baseline: Report,
}

pub struct Notifier<S> {
    sink: S,
    destination: String,
}

impl<S: MessageSink> Notifier<S> {
    pub fn new(sink: S, destination: impl Into<String>) -> Self {
        Notifier {
            sink,
            destination: destination.into(),
        }
    }

    /// Send `report` unless it matches `baseline` or is empty.
    ///
    /// The baseline only advances when the report was delivered or is empty,
    /// so a failed send is compared (and retried) again next time.
    pub async fn notify(&self, report: Report, baseline: Report) -> Delivery {
        if report == baseline {
            return Delivery {
                sent: false,
                baseline,
            };
        }
        if report.is_empty() {
            info!("Report is empty, nothing to send");
            return Delivery {
                sent: false,
                baseline: report,
            };
        }

        match self.sink.send_text(&self.destination, &report.render()).await {
            Ok(()) => {
                info!(changes = report.len(), "Price change report sent");
                Delivery {
                    sent: true,
                    baseline: report,
                }
            }
            Err(e) => {
                error!(error_kind = "notify_transport", "Failed to send report: {}", e);
                Delivery {
                    sent: false,
                    baseline,
                }
            }
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
