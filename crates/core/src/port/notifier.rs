// Notifier Port (outbound email boundary)

use crate::error::Result;
use async_trait::async_trait;

/// Outbound mail capability consumed by the overdue sweep.
///
/// Implementations:
/// - TracingNotifier (infra-memory): logs mail instead of sending (dev transport)
/// - a real SMTP/API transport in the surrounding service
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one email. Errors are per-recipient and the caller decides
    /// whether they abort the surrounding batch (the sweep does not).
    async fn send_mail(&self, to: &str, subject: &str, body_html: &str) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::PipelineError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// One recorded outbound mail
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub body_html: String,
    }

    /// Recording notifier with scriptable per-recipient failures
    pub struct MockNotifier {
        sent: Mutex<Vec<SentMail>>,
        failing_recipients: Mutex<HashSet<String>>,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failing_recipients: Mutex::new(HashSet::new()),
            }
        }

        /// Every send to `recipient` will fail with a Mail error.
        pub fn fail_for(&self, recipient: impl Into<String>) {
            self.failing_recipients
                .lock()
                .unwrap()
                .insert(recipient.into());
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn recipients(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|m| m.to.clone())
                .collect()
        }
    }

    impl Default for MockNotifier {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send_mail(&self, to: &str, subject: &str, body_html: &str) -> Result<()> {
            if self.failing_recipients.lock().unwrap().contains(to) {
                return Err(PipelineError::Mail(format!(
                    "simulated send failure for {}",
                    to
                )));
            }
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body_html: body_html.to_string(),
            });
            Ok(())
        }
    }
}
