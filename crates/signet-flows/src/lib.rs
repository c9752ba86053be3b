//! Use cases for the Signet signing workflow.
//!
//! Every flow is generic over a [`signet_core::store::VersionStore`] and the
//! collaborator traits it needs; nothing here knows about SQLite, S3, or any
//! broker. Flows load the latest snapshot, run the state-machine guards from
//! `signet-core::lifecycle`, and commit a new version through
//! [`chain::commit`], which re-reads and rebuilds on append conflicts.

pub mod chain;
pub mod draft;
pub mod error;
pub mod recycle;
pub mod register;
pub mod reject;
pub mod resign;
pub mod send;
pub mod sign;

pub use error::{Error, Result};
pub use register::RegistrationCoordinator;

#[cfg(test)]
mod tests;
