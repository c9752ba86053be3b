//! Blockchain registration coordinator.

use chrono::Utc;
use signet_core::{
  clients::LedgerClient,
  document::{BlockchainRegistration, DocumentSnapshot, RegistrationStatus},
  lifecycle,
  retry::RetryPolicy,
  store::{AttemptAction, RegistrationAttempt, VersionStore},
  Error as CoreError,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{chain, Error, Result};

/// Anchors a completed document's content hash on an external ledger.
///
/// Every attempt, success, failure, and cancellation is written as an
/// immutable audit row; those rows persist even when the registration itself
/// never commits. The registration snapshot is appended only on success, so
/// a crashed or exhausted run leaves the document registrable again.
pub struct RegistrationCoordinator<'a, S, L> {
  store:   &'a S,
  ledger:  &'a L,
  policy:  RetryPolicy,
  network: Option<String>,
}

impl<'a, S, L> RegistrationCoordinator<'a, S, L>
where
  S: VersionStore,
  L: LedgerClient,
{
  pub fn new(store: &'a S, ledger: &'a L) -> Self {
    Self {
      store,
      ledger,
      policy: RetryPolicy::registration(),
      network: None,
    }
  }

  /// Mostly for tests, which want zero delay.
  pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Network name written on audit rows recorded before a receipt exists.
  pub fn with_network(mut self, network: impl Into<String>) -> Self {
    self.network = Some(network.into());
    self
  }

  /// Register `document_id` on the ledger, retrying transient failures up to
  /// the policy's attempt budget. `cancel` aborts between and during
  /// attempts; a cancelled run records a `Cancelled` audit row and returns
  /// [`Error::Cancelled`].
  pub async fn register(
    &self,
    document_id: Uuid,
    cancel: &CancellationToken,
  ) -> Result<DocumentSnapshot> {
    let latest = chain::load_latest(self.store, document_id, None).await?;
    lifecycle::ensure_can_register(&latest)?;
    let hash = latest.metadata.content_hash.clone().ok_or_else(|| {
      CoreError::Validation(
        "document has no content hash to register".into(),
      )
    })?;

    for attempt in 1..=self.policy.max_attempts {
      let network = self.network.as_deref();
      if cancel.is_cancelled() {
        self
          .record(
            document_id,
            attempt,
            AttemptAction::Cancelled,
            &hash,
            network,
            None,
          )
          .await;
        return Err(Error::Cancelled(document_id));
      }

      self
        .record(
          document_id,
          attempt,
          AttemptAction::Attempt,
          &hash,
          network,
          None,
        )
        .await;

      let outcome = tokio::select! {
        _ = cancel.cancelled() => {
          self
            .record(
              document_id,
              attempt,
              AttemptAction::Cancelled,
              &hash,
              network,
              None,
            )
            .await;
          return Err(Error::Cancelled(document_id));
        }
        outcome = self.ledger.send_transaction(&hash) => outcome,
      };

      match outcome {
        Ok(receipt) => {
          info!(
            %document_id,
            transaction = %receipt.transaction_id,
            network = %receipt.network,
            attempt,
            "registered on ledger"
          );
          self
            .record(
              document_id,
              attempt,
              AttemptAction::Success,
              &hash,
              Some(&receipt.network),
              None,
            )
            .await;

          let registration = BlockchainRegistration {
            contract_id:    receipt.contract_id,
            transaction_id: receipt.transaction_id,
            hash:           hash.clone(),
            network:        receipt.network,
            registered_at:  receipt.timestamp,
            status:         RegistrationStatus::Success,
            attempts:       attempt,
          };
          return chain::commit(self.store, document_id, None, |current| {
            lifecycle::ensure_can_register(current)?;
            Ok(current.next().with_blockchain(registration.clone()).build())
          })
          .await;
        }
        Err(error) => {
          warn!(%document_id, attempt, %error, "ledger call failed");
          self
            .record(
              document_id,
              attempt,
              AttemptAction::Failure,
              &hash,
              network,
              Some(error.to_string()),
            )
            .await;

          if !self.policy.is_last(attempt) {
            tokio::select! {
              _ = cancel.cancelled() => {
                self
                  .record(
                    document_id,
                    attempt,
                    AttemptAction::Cancelled,
                    &hash,
                    network,
                    None,
                  )
                  .await;
                return Err(Error::Cancelled(document_id));
              }
              _ = tokio::time::sleep(self.policy.next_delay()) => {}
            }
          }
        }
      }
    }

    Err(
      CoreError::RegistrationUnavailable {
        attempts: self.policy.max_attempts,
      }
      .into(),
    )
  }

  /// Audit-row writes never abort a registration in flight.
  async fn record(
    &self,
    document_id: Uuid,
    attempt_number: u32,
    action: AttemptAction,
    hash: &str,
    network: Option<&str>,
    error: Option<String>,
  ) {
    let row = RegistrationAttempt {
      document_id,
      attempt_number,
      action,
      recorded_at: Utc::now(),
      hash: Some(hash.to_string()),
      network: network.map(str::to_string),
      error,
    };
    if let Err(error) = self.store.record_registration_attempt(row).await {
      warn!(%document_id, %error, "could not write registration audit row");
    }
  }
}
