//! Core types and trait definitions for Keyward.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the issue-record model, the overdue lifecycle policy, the store and
//! notifier abstractions, and the batch processor that drives records through
//! `active → overdue → escalated`.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod actions;
pub mod audit;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod party;
pub mod policy;
pub mod processor;
pub mod record;
pub mod report;
pub mod security;
pub mod store;

pub use error::{Error, Result};

#[cfg(test)]
mod fakes;
