//! Bearer-token auth: an extractor, a middleware for nested routers, and a
//! standalone verifier.
//!
//! The configured secret is an argon2 PHC string, never the token itself.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, header, request::Parts},
  middleware::Next,
  response::Response,
};
use keyward_core::{notify::Notifier, store::IssueStore};
use rand_core::OsRng;

use crate::{AppState, error::Error};

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub token_hash: String,
}

/// Zero-size marker: present in the handler means the request was authenticated.
pub struct Authenticated;

/// Hash `token` into the PHC string expected in `auth_token_hash`.
pub fn hash_token(token: &str) -> Result<String, argon2::password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(token.as_bytes(), &salt)?.to_string())
}

/// Verify the bearer token in `headers`.
pub fn verify_bearer(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let token = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&config.token_hash).map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(token.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)
}

/// Middleware guarding routers that carry their own state.
pub async fn require_bearer(
  State(config): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  verify_bearer(req.headers(), &config)?;
  Ok(next.run(req).await)
}

impl<S, N> FromRequestParts<AppState<S, N>> for Authenticated
where
  S: IssueStore + 'static,
  N: Notifier + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, N>,
  ) -> Result<Self, Self::Rejection> {
    verify_bearer(&parts.headers, &state.auth)?;
    Ok(Authenticated)
  }
}
