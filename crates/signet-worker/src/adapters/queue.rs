//! In-memory workflow queue.

use std::{
  collections::{HashMap, VecDeque},
  sync::Mutex,
};

use signet_core::{
  clients::{MessageQueue, QueueEnvelope},
  Error as CoreError, Result,
};
use tracing::debug;
use uuid::Uuid;

/// A single-process queue with delivery receipts.
///
/// Received messages move to an in-flight set until acknowledged; messages
/// whose handler failed stay in flight and come back on
/// [`Self::redeliver_unacknowledged`], mimicking a broker's redelivery
/// policy.
#[derive(Default)]
pub struct InMemoryQueue {
  ready:     Mutex<VecDeque<QueueEnvelope>>,
  in_flight: Mutex<HashMap<String, QueueEnvelope>>,
}

impl InMemoryQueue {
  pub fn new() -> Self { Self::default() }

  /// Move every unacknowledged in-flight message back to the ready queue.
  pub fn redeliver_unacknowledged(&self) {
    let mut in_flight = self.in_flight.lock().unwrap();
    let mut ready = self.ready.lock().unwrap();
    for (_, envelope) in in_flight.drain() {
      ready.push_back(envelope);
    }
  }

  pub fn pending(&self) -> usize { self.ready.lock().unwrap().len() }

  pub fn unacknowledged(&self) -> usize {
    self.in_flight.lock().unwrap().len()
  }
}

impl MessageQueue for InMemoryQueue {
  async fn receive(
    &self,
    max: usize,
  ) -> Result<Vec<(String, QueueEnvelope)>> {
    let mut ready = self.ready.lock().unwrap();
    let mut in_flight = self.in_flight.lock().unwrap();

    let mut batch = Vec::new();
    while batch.len() < max {
      let Some(envelope) = ready.pop_front() else { break };
      let receipt = Uuid::new_v4().simple().to_string();
      in_flight.insert(receipt.clone(), envelope.clone());
      batch.push((receipt, envelope));
    }
    Ok(batch)
  }

  async fn acknowledge(&self, receipt: &str) -> Result<()> {
    match self.in_flight.lock().unwrap().remove(receipt) {
      Some(_) => Ok(()),
      None => Err(CoreError::Validation(format!(
        "unknown delivery receipt {receipt}"
      ))),
    }
  }

  async fn publish(
    &self,
    queue: &str,
    envelope: QueueEnvelope,
  ) -> Result<()> {
    debug!(queue, action = %envelope.action, "message published");
    self.ready.lock().unwrap().push_back(envelope);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use signet_core::clients::WorkflowAction;

  use super::*;

  fn envelope(action: WorkflowAction) -> QueueEnvelope {
    QueueEnvelope {
      action,
      document_id: None,
      user_id: None,
      data_email: None,
      timestamp: Utc::now(),
    }
  }

  #[tokio::test]
  async fn receive_moves_messages_in_flight() {
    let q = InMemoryQueue::new();
    q.publish("workflow", envelope(WorkflowAction::Delete))
      .await
      .unwrap();
    q.publish("workflow", envelope(WorkflowAction::Restore))
      .await
      .unwrap();

    let batch = q.receive(1).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(q.pending(), 1);
    assert_eq!(q.unacknowledged(), 1);

    q.acknowledge(&batch[0].0).await.unwrap();
    assert_eq!(q.unacknowledged(), 0);
  }

  #[tokio::test]
  async fn unacknowledged_messages_are_redeliverable() {
    let q = InMemoryQueue::new();
    q.publish("workflow", envelope(WorkflowAction::Delete))
      .await
      .unwrap();

    let batch = q.receive(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(q.pending(), 0);

    // Handler failed; the message was never acknowledged.
    q.redeliver_unacknowledged();
    assert_eq!(q.pending(), 1);
    assert_eq!(q.unacknowledged(), 0);
  }

  #[tokio::test]
  async fn double_acknowledge_is_an_error() {
    let q = InMemoryQueue::new();
    q.publish("workflow", envelope(WorkflowAction::Delete))
      .await
      .unwrap();
    let batch = q.receive(10).await.unwrap();

    q.acknowledge(&batch[0].0).await.unwrap();
    assert!(q.acknowledge(&batch[0].0).await.is_err());
  }
}
