//! Escalation engine: decides when failures become alerts

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::history::HistoryHandle;
use crate::message::AlertFormatter;
use crate::notifier::{Delivery, Dispatcher, Notification};
use crate::probe::{current_epoch_ms, CheckResult, Prober};
use crate::state::{AlertState, AlertStateStore};

/// Minimum delay before the next alert, indexed by alerts already sent for
/// the current streak; saturates at the last entry
pub const ALERT_INTERVALS: [Duration; 5] = [
    Duration::from_secs(2 * 60),
    Duration::from_secs(10 * 60),
    Duration::from_secs(30 * 60),
    Duration::from_secs(60 * 60),
    Duration::from_secs(60 * 60),
];

pub fn required_interval(alert_count: u32) -> Duration {
    let index = (alert_count as usize).min(ALERT_INTERVALS.len() - 1);
    ALERT_INTERVALS[index]
}

/// Whether enough time has passed since the last alert to send another
pub fn should_alert(state: &AlertState, now_ms: u64) -> bool {
    match state.last_alert_time {
        None => true,
        Some(last) => {
            now_ms.saturating_sub(last) >= required_interval(state.alert_count).as_millis() as u64
        }
    }
}

/// Runs check cycles: probe, decide, dispatch, persist, record.
///
/// The alert state store sits behind a mutex so the scheduled loop and manual
/// `/check-service` triggers serialize on the whole
/// read-decide-dispatch-persist sequence.
pub struct Engine {
    prober: Arc<dyn Prober>,
    dispatcher: Dispatcher,
    formatter: AlertFormatter,
    store: Mutex<AlertStateStore>,
    history: HistoryHandle,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("prober", &self.prober).finish()
    }
}

impl Engine {
    pub fn new(
        prober: Arc<dyn Prober>,
        dispatcher: Dispatcher,
        formatter: AlertFormatter,
        store: AlertStateStore,
        history: HistoryHandle,
    ) -> Self {
        Self {
            prober,
            dispatcher,
            formatter,
            store: Mutex::new(store),
            history,
        }
    }

    pub fn history(&self) -> HistoryHandle {
        Arc::clone(&self.history)
    }

    /// Run one full check cycle and return the probe result
    pub async fn check_once(&self) -> CheckResult {
        let result = self.prober.probe().await;
        self.apply(&result, current_epoch_ms()).await;
        self.history.write().await.append(result.clone());
        result
    }

    /// Feed one probe result through the escalation state machine
    pub async fn apply(&self, result: &CheckResult, now_ms: u64) {
        let store = self.store.lock().await;
        let state = store.load();

        if result.is_healthy() {
            if let Some(latency) = result.latency_ms {
                tracing::info!("Service healthy ({} ms)", latency);
            }
            if state.is_service_down {
                tracing::info!("Service recovered after {} alert(s)", state.alert_count);
                let notification = Notification {
                    text: self.formatter.recovery_message(now_ms),
                };
                // Best-effort: the reset below happens regardless of delivery
                if self.dispatcher.dispatch(&notification).await == Delivery::Failed {
                    tracing::warn!("Recovery notification was not delivered");
                }
                if let Err(e) = store.save(&AlertState::default()) {
                    tracing::error!("Failed to persist alert state: {}", e);
                }
            }
            return;
        }

        let error = result.error.as_deref().unwrap_or("unknown error");
        tracing::warn!("Health check failed: {}", error);

        if !should_alert(&state, now_ms) {
            tracing::info!(
                "Alert suppressed: waiting {:?} after alert #{}",
                required_interval(state.alert_count),
                state.alert_count
            );
            return;
        }

        let alert_number = state.alert_count + 1;
        let notification = Notification {
            text: self.formatter.failure_message(error, alert_number, now_ms),
        };

        match self.dispatcher.dispatch(&notification).await {
            Delivery::Sent => {
                let next = AlertState {
                    last_alert_time: Some(now_ms),
                    alert_count: alert_number,
                    is_service_down: true,
                };
                if let Err(e) = store.save(&next) {
                    tracing::error!("Failed to persist alert state: {}", e);
                }
            }
            // A disabled channel never counts as delivered; the alert slot
            // stays open until notifications are configured
            Delivery::Disabled => {
                tracing::debug!("Alert #{} skipped: notifications disabled", alert_number);
            }
            Delivery::Failed => {
                tracing::warn!(
                    "Alert #{} not delivered; will retry at the same escalation step",
                    alert_number
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::new_history_handle;
    use crate::notifier::Notifier;
    use crate::probe::ServiceStatus;
    use async_trait::async_trait;
    use std::path::Path;

    const MINUTE_MS: u64 = 60 * 1000;

    /// Notifier double that records every message it accepts
    #[derive(Debug)]
    struct RecordingNotifier {
        enabled: bool,
        succeed: bool,
        messages: tokio::sync::Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                enabled: true,
                succeed: true,
                messages: tokio::sync::Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                enabled: true,
                succeed: false,
                messages: tokio::sync::Mutex::new(Vec::new()),
            })
        }

        fn disabled() -> Arc<Self> {
            Arc::new(Self {
                enabled: false,
                succeed: true,
                messages: tokio::sync::Mutex::new(Vec::new()),
            })
        }

        async fn messages(&self) -> Vec<String> {
            self.messages.lock().await.clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn type_name(&self) -> &str {
            "recording"
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        async fn notify(&self, notification: &Notification) -> crate::Result<()> {
            if self.succeed {
                self.messages.lock().await.push(notification.text.clone());
                Ok(())
            } else {
                Err(crate::VigilError::Notifier("delivery refused".to_string()))
            }
        }
    }

    /// Prober double returning a fixed result
    #[derive(Debug)]
    struct FixedProber {
        result: CheckResult,
    }

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self) -> CheckResult {
            self.result.clone()
        }
    }

    fn healthy_at(timestamp_epoch_ms: u64) -> CheckResult {
        CheckResult {
            timestamp_epoch_ms,
            status: ServiceStatus::Healthy,
            latency_ms: Some(15),
            status_code: Some(200),
            data: None,
            error: None,
        }
    }

    fn unhealthy_at(timestamp_epoch_ms: u64) -> CheckResult {
        CheckResult {
            timestamp_epoch_ms,
            status: ServiceStatus::Unhealthy,
            latency_ms: None,
            status_code: None,
            data: None,
            error: Some("connection refused".to_string()),
        }
    }

    fn engine_with(
        notifier: Arc<RecordingNotifier>,
        state_path: &Path,
        result: CheckResult,
    ) -> Engine {
        Engine::new(
            Arc::new(FixedProber { result }),
            Dispatcher::with_policy(notifier, 3, Duration::from_millis(1)),
            AlertFormatter::new("Test Service".to_string(), "http://t".to_string()),
            AlertStateStore::new(state_path),
            new_history_handle(10),
        )
    }

    fn state_at(path: &Path) -> AlertState {
        AlertStateStore::new(path).load()
    }

    #[test]
    fn ladder_saturates_at_one_hour() {
        assert_eq!(required_interval(0), Duration::from_secs(120));
        assert_eq!(required_interval(1), Duration::from_secs(600));
        assert_eq!(required_interval(2), Duration::from_secs(1800));
        assert_eq!(required_interval(3), Duration::from_secs(3600));
        assert_eq!(required_interval(4), Duration::from_secs(3600));
        assert_eq!(required_interval(100), Duration::from_secs(3600));
    }

    #[test]
    fn should_alert_is_immediate_with_no_prior_alert() {
        assert!(should_alert(&AlertState::default(), 0));
        assert!(should_alert(&AlertState::default(), u64::MAX));
    }

    #[test]
    fn should_alert_respects_the_ladder() {
        let state = AlertState {
            last_alert_time: Some(0),
            alert_count: 1,
            is_service_down: true,
        };
        assert!(!should_alert(&state, 9 * MINUTE_MS));
        assert!(should_alert(&state, 10 * MINUTE_MS));
    }

    #[tokio::test]
    async fn first_unhealthy_check_alerts_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(0));

        let t0 = 1_000_000;
        engine.apply(&unhealthy_at(t0), t0).await;

        let messages = notifier.messages().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("<b>Alert:</b> #1"));
        assert_eq!(
            state_at(&path),
            AlertState {
                last_alert_time: Some(t0),
                alert_count: 1,
                is_service_down: true,
            }
        );
    }

    #[tokio::test]
    async fn alert_within_required_interval_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(0));

        let t0 = 1_000_000;
        engine.apply(&unhealthy_at(t0), t0).await;
        // 90s later: required interval after one alert is 10 minutes
        engine.apply(&unhealthy_at(t0 + 90_000), t0 + 90_000).await;

        assert_eq!(notifier.messages().await.len(), 1);
        assert_eq!(state_at(&path).last_alert_time, Some(t0));
        assert_eq!(state_at(&path).alert_count, 1);
    }

    #[tokio::test]
    async fn alert_past_required_interval_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(0));

        let t0 = 1_000_000;
        engine.apply(&unhealthy_at(t0), t0).await;
        let t1 = t0 + 11 * MINUTE_MS;
        engine.apply(&unhealthy_at(t1), t1).await;

        let messages = notifier.messages().await;
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("<b>Alert:</b> #2"));
        assert_eq!(
            state_at(&path),
            AlertState {
                last_alert_time: Some(t1),
                alert_count: 2,
                is_service_down: true,
            }
        );
    }

    #[tokio::test]
    async fn recovery_notifies_once_and_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(0));

        let t0 = 1_000_000;
        engine.apply(&unhealthy_at(t0), t0).await;
        engine.apply(&healthy_at(t0 + MINUTE_MS), t0 + MINUTE_MS).await;
        engine
            .apply(&healthy_at(t0 + 2 * MINUTE_MS), t0 + 2 * MINUTE_MS)
            .await;

        let messages = notifier.messages().await;
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("IS BACK UP!"));
        assert_eq!(state_at(&path), AlertState::default());
    }

    #[tokio::test]
    async fn healthy_check_while_up_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, healthy_at(0));

        engine.apply(&healthy_at(1000), 1000).await;

        assert!(notifier.messages().await.is_empty());
        assert_eq!(state_at(&path), AlertState::default());
    }

    #[tokio::test]
    async fn failed_dispatch_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::failing();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(0));

        let t0 = 1_000_000;
        engine.apply(&unhealthy_at(t0), t0).await;

        // All attempts exhausted and nothing persisted: the next cycle
        // recomputes the same decision
        assert_eq!(state_at(&path), AlertState::default());
        engine.apply(&unhealthy_at(t0 + 1000), t0 + 1000).await;
        assert_eq!(state_at(&path), AlertState::default());
    }

    #[tokio::test]
    async fn disabled_notifications_hold_state_static() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::disabled();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(0));

        engine.apply(&unhealthy_at(1_000_000), 1_000_000).await;

        assert!(notifier.messages().await.is_empty());
        assert_eq!(state_at(&path), AlertState::default());
    }

    #[tokio::test]
    async fn corrupt_state_file_degrades_to_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{broken").unwrap();

        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(0));
        engine.apply(&unhealthy_at(1_000_000), 1_000_000).await;

        // Treated as a first alert, not a failed check
        assert_eq!(notifier.messages().await.len(), 1);
        assert_eq!(state_at(&path).alert_count, 1);
    }

    #[tokio::test]
    async fn recovery_without_prior_alert_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, healthy_at(0));

        // Outage during which no alert was ever delivered leaves
        // is_service_down false, so recovery has nothing to announce
        engine.apply(&healthy_at(1000), 1000).await;
        assert!(notifier.messages().await.is_empty());
    }

    #[tokio::test]
    async fn check_once_appends_to_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let notifier = RecordingNotifier::new();
        let engine = engine_with(Arc::clone(&notifier), &path, unhealthy_at(42));

        let result = engine.check_once().await;
        assert_eq!(result.status, ServiceStatus::Unhealthy);

        let history = engine.history();
        let snapshot = history.read().await.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].timestamp_epoch_ms, 42);
    }
}
