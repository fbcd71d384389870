//! Core domain + application logic for GraceBot.
//!
//! This crate is intentionally framework-agnostic. The messaging platform
//! connector and the language-understanding client live behind ports (traits)
//! implemented in adapter crates.

pub mod activity;
pub mod app;
pub mod config;
pub mod definition;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod persistence;
pub mod ports;

pub use errors::{Error, Result};
