//! Background workflow worker for Signet.
//!
//! Consumes workflow envelopes from a [`signet_core::clients::MessageQueue`],
//! dispatches them to the flows in `signet-flows`, and runs the PDF
//! finalisation pipeline from `signet-pdf`. Ships local adapters for the
//! collaborator traits: a filesystem object store, an in-memory queue, a
//! simulated ledger, and a logging notifier.

pub mod adapters;
pub mod config;
pub mod consumer;
pub mod error;

pub use config::WorkerConfig;
pub use consumer::WorkflowConsumer;
pub use error::{Error, Result};
