//! Core domain + application logic for the KömekBai lesson bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind a
//! port (trait) implemented in the adapter crate; here live the content
//! store, the subscription ledger, the access policy and the lifecycle
//! sweeper.

pub mod access;
pub mod config;
pub mod content;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod reports;
pub mod session;
pub mod sweeper;
pub mod texts;

pub use errors::{Error, Result};
