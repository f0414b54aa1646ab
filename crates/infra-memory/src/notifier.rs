// Tracing-backed Notifier (development transport)

use async_trait::async_trait;
use taskpipe_core::error::Result;
use taskpipe_core::port::Notifier;
use tracing::info;

/// Logs outbound mail instead of sending it. Stands in for the real SMTP/API
/// transport during development and in the demo daemon.
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_mail(&self, to: &str, subject: &str, body_html: &str) -> Result<()> {
        info!(
            recipient = %to,
            subject = %subject,
            body_bytes = body_html.len(),
            "Outbound mail (tracing transport)"
        );
        Ok(())
    }
}
