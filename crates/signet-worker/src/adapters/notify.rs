//! Logging notifier.

use signet_core::{
  clients::{EmailPayload, Notifier},
  Result,
};
use tracing::info;

/// Writes notifications and emails to the log instead of delivering them.
/// Used where no real notification channel is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  async fn notify(
    &self,
    user_id: &str,
    payload: serde_json::Value,
  ) -> Result<()> {
    info!(user_id, %payload, "notification");
    Ok(())
  }

  async fn send_email(&self, payload: &EmailPayload) -> Result<()> {
    info!(to = %payload.to, subject = %payload.subject, "outbound email");
    Ok(())
  }
}
