//! HTTP webhook delivery.

use std::time::Duration;

use keyward_core::{
  notify::{Notifier, OverdueAlert},
  security::SecurityReport,
};
use reqwest::{Client, Url};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, NotifierConfig, Result};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Stable key for one alert about one record on one overdue day, so retries
/// and same-day reruns can be collapsed by the receiver.
pub fn idempotency_key(record_id: Uuid, kind: &str, days_overdue: i64) -> String {
  let mut hasher = Sha256::new();
  hasher.update(record_id.as_bytes());
  hasher.update(kind.as_bytes());
  hasher.update(days_overdue.to_be_bytes());
  hex::encode(hasher.finalize())
}

fn parse_url(url: &Option<String>) -> Result<Option<Url>> {
  url
    .as_deref()
    .map(|u| {
      Url::parse(u).map_err(|e| Error::InvalidUrl { url: u.to_owned(), reason: e.to_string() })
    })
    .transpose()
}

/// POSTs alerts as JSON. Sending an alert kind without a URL fails with
/// [`Error::NotConfigured`] so the caller counts it as undelivered.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WebhookNotifier {
  client:       Client,
  alert_url:    Option<Url>,
  security_url: Option<Url>,
  token:        Option<String>,
}

impl WebhookNotifier {
  pub fn new(config: &NotifierConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      alert_url: parse_url(&config.alert_url)?,
      security_url: parse_url(&config.security_url)?,
      token: config.token.clone(),
    })
  }

  async fn post<T: Serialize + ?Sized>(&self, url: &Url, key: String, body: &T) -> Result<()> {
    let mut req = self
      .client
      .post(url.clone())
      .header(IDEMPOTENCY_HEADER, key)
      .json(body);
    if let Some(token) = &self.token {
      req = req.bearer_auth(token);
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(Error::Status { url: url.to_string(), status: resp.status() });
    }
    Ok(())
  }
}

impl Notifier for WebhookNotifier {
  type Error = Error;

  async fn send_overdue_alert(&self, alert: &OverdueAlert) -> Result<()> {
    let Some(url) = &self.alert_url else {
      tracing::warn!(record_id = %alert.record_id, "no alert_url configured; alert not sent");
      return Err(Error::NotConfigured { kind: alert.kind.name() });
    };
    let key = idempotency_key(alert.record_id, alert.kind.name(), alert.days_overdue);
    self.post(url, key, alert).await?;
    tracing::debug!(record_id = %alert.record_id, kind = alert.kind.name(), "overdue alert delivered");
    Ok(())
  }

  async fn send_escalation_alert(&self, report: &SecurityReport) -> Result<()> {
    let Some(url) = &self.security_url else {
      tracing::warn!(record_id = %report.id, "no security_url configured; report not sent");
      return Err(Error::NotConfigured { kind: "escalation" });
    };
    let key = idempotency_key(report.id, "escalation", report.days_overdue);
    self.post(url, key, report).await?;
    tracing::debug!(record_id = %report.id, "security report delivered");
    Ok(())
  }
}
