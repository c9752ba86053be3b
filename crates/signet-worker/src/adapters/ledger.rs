//! Simulated blockchain ledger client.

use chrono::Utc;
use signet_core::{
  clients::{LedgerClient, LedgerReceipt},
  Result,
};
use tracing::debug;
use uuid::Uuid;

/// Accepts every transaction and fabricates a receipt. Stands in for a real
/// chain client in local and test deployments.
pub struct SimulatedLedger {
  network:     String,
  contract_id: String,
}

impl SimulatedLedger {
  pub fn new(network: impl Into<String>) -> Self {
    Self {
      network:     network.into(),
      contract_id: "contract-0.0.1".into(),
    }
  }
}

impl LedgerClient for SimulatedLedger {
  async fn send_transaction(&self, hash: &str) -> Result<LedgerReceipt> {
    debug!(hash, network = %self.network, "simulated ledger transaction");
    Ok(LedgerReceipt {
      contract_id:    self.contract_id.clone(),
      transaction_id: format!("0x{}", Uuid::new_v4().simple()),
      network:        self.network.clone(),
      timestamp:      Utc::now(),
    })
  }
}
