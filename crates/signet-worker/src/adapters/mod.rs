//! Local adapters for the collaborator traits in `signet_core::clients`.

pub mod fs_store;
pub mod ledger;
pub mod notify;
pub mod queue;

pub use fs_store::FsObjectStore;
pub use ledger::SimulatedLedger;
pub use notify::LogNotifier;
pub use queue::InMemoryQueue;
