pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait CallProvider: Send + Sync {
    async fn place_call(&self, to: &str) -> anyhow::Result<()>;
}

/// Fallback used when no telephony credentials are configured: the call is
/// logged instead of dialed.
pub struct LogCallProvider;

#[async_trait]
impl CallProvider for LogCallProvider {
    async fn place_call(&self, to: &str) -> anyhow::Result<()> {
        tracing::info!(to, "telephony not configured, logging call instead of dialing");
        Ok(())
    }
}
