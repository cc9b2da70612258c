//! Error type for `keyward-notify`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid notifier url {url:?}: {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("no url configured for {kind} alerts")]
  NotConfigured { kind: &'static str },

  #[error("{url} responded with {status}")]
  Status { url: String, status: reqwest::StatusCode },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
