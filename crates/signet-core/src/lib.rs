//! Core types and trait definitions for the Signet signing platform.
//!
//! This crate is deliberately free of PDF and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clients;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod participant;
pub mod retry;
pub mod signature;
pub mod store;

pub use error::{Error, Result};
