//! Notifier trait and the retrying dispatcher in front of it

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Message to be delivered to the notification channel
#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
}

/// Outcome of a dispatch, with all retries spent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The channel accepted the message
    Sent,
    /// The channel has no credentials configured; nothing was attempted
    Disabled,
    /// Every attempt failed
    Failed,
}

/// Trait for a notification channel
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "telegram")
    fn type_name(&self) -> &str;

    /// Whether the channel has the credentials it needs to deliver
    fn enabled(&self) -> bool {
        true
    }

    /// One delivery attempt
    async fn notify(&self, notification: &Notification) -> crate::Result<()>;
}

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Delivers notifications with bounded retries and exponential backoff.
///
/// Never propagates a channel error past its boundary: the caller sees a
/// [`Delivery`] outcome and failures are logged.
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    max_retries: u32,
    base_delay: Duration,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("notifier", &self.notifier.type_name())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_policy(notifier, DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }

    pub fn with_policy(notifier: Arc<dyn Notifier>, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            notifier,
            max_retries,
            base_delay,
        }
    }

    /// Attempt delivery up to `max_retries + 1` times, delaying
    /// `base_delay * 2^(k-1)` before retry `k`
    pub async fn dispatch(&self, notification: &Notification) -> Delivery {
        if !self.notifier.enabled() {
            tracing::debug!(
                "Notifier '{}' has no credentials configured, skipping dispatch",
                self.notifier.type_name()
            );
            return Delivery::Disabled;
        }

        let mut attempt: u32 = 0;
        loop {
            match self.notifier.notify(notification).await {
                Ok(()) => {
                    tracing::debug!(
                        "Notification delivered via '{}' on attempt {}",
                        self.notifier.type_name(),
                        attempt + 1
                    );
                    return Delivery::Sent;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        tracing::warn!(
                            "Notification via '{}' failed after {} attempts: {}",
                            self.notifier.type_name(),
                            attempt,
                            e
                        );
                        return Delivery::Failed;
                    }

                    let delay = self.base_delay * 2u32.pow(attempt - 1);
                    tracing::debug!(
                        "Notification attempt {} via '{}' failed ({}), retrying in {:?}",
                        attempt,
                        self.notifier.type_name(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
