//! Core domain + application logic for the YOURLS bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the YOURLS HTTP
//! API live behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod app;
pub mod cache;
pub mod config;
pub mod dialog;
pub mod domain;
pub mod ephemeral;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod session;
pub mod shorten;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
