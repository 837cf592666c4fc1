use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::display::{DisplayState, Frame};
use crate::protocol::client::RelayTransport;
use crate::protocol::messages::RelayAction;

/// Cadence of the drift-correction poll loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// How long a pressed control stays highlighted.
pub const DEFAULT_PRESS_FLASH: Duration = Duration::from_millis(300);

struct ControllerInner {
    transport: Arc<dyn RelayTransport>,
    display: RwLock<DisplayState>,
    /// Single-slot guard for user-initiated commands. Held for one
    /// command cycle; overlapping requests are dropped, not queued.
    busy: AtomicBool,
    press_flash: Duration,
    frames: watch::Sender<Frame>,
}

/// Keeps the displayed relay state reconciled with the service-reported
/// one: optimistic overwrite on user action, server-confirmed overwrite
/// when the request resolves, offline overlay on failed polls.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SwitchController {
    inner: Arc<ControllerInner>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SwitchController {
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        Self::with_press_flash(transport, DEFAULT_PRESS_FLASH)
    }

    pub fn with_press_flash(transport: Arc<dyn RelayTransport>, press_flash: Duration) -> Self {
        let display = DisplayState::default();
        let (frames, _) = watch::channel(display.frame());
        SwitchController {
            inner: Arc::new(ControllerInner {
                transport,
                display: RwLock::new(display),
                busy: AtomicBool::new(false),
                press_flash,
                frames,
            }),
        }
    }

    /// Latest rendered frame.
    pub fn frame(&self) -> Frame {
        self.inner.frames.borrow().clone()
    }

    /// Subscribe to frame updates. The receiver starts out holding the
    /// current frame.
    pub fn subscribe(&self) -> watch::Receiver<Frame> {
        self.inner.frames.subscribe()
    }

    fn publish(&self) {
        let frame = self.inner.display.read().frame();
        self.inner.frames.send_replace(frame);
    }

    fn try_busy(&self) -> Option<BusyGuard<'_>> {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(&self.inner.busy))
    }

    /// One drift-correction poll. On success the cached state is
    /// overwritten with the reported one and the offline overlay is
    /// cleared; any failure degrades to the offline overlay. Never
    /// returns an error to the caller.
    pub async fn poll_status(&self) {
        match self.inner.transport.status().await {
            Ok(status) => {
                self.inner.display.write().apply_report(status.relay_on);
            }
            Err(e) => {
                warn!("Status poll failed, marking panel offline: {e}");
                self.inner.display.write().mark_offline();
            }
        }
        self.publish();
    }

    /// User-initiated command. Silently skipped while another command
    /// is in flight. The display is overwritten optimistically before
    /// the request goes out, then reconciled with the server-reported
    /// state on success, or resynchronized with a single poll on
    /// failure. The busy guard is released on every exit path.
    pub async fn request_action(&self, action: RelayAction) {
        let Some(_busy) = self.try_busy() else {
            debug!("Command already in flight, skipping {action}");
            return;
        };

        {
            let mut display = self.inner.display.write();
            display.apply_report(action.is_on());
            display.press(action);
        }
        self.publish();
        self.spawn_press_release(action);

        match self.inner.transport.toggle(action).await {
            Ok(status) => {
                // Server is authoritative; it may disagree with the
                // optimistic value if the command did not take effect.
                self.inner.display.write().apply_report(status.relay_on);
                self.publish();
            }
            Err(e) => {
                warn!("Relay action {action} failed, resynchronizing: {e}");
                self.poll_status().await;
            }
        }
    }

    fn spawn_press_release(&self, action: RelayAction) {
        let controller = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(controller.inner.press_flash).await;
            controller.inner.display.write().release(action);
            controller.publish();
        });
    }

    /// Start the fixed-interval poll loop. The first tick fires
    /// immediately, covering the initial load; the task then runs for
    /// the lifetime of the process.
    pub fn spawn_poll_loop(&self, interval: Duration) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                controller.poll_status().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;
    use crate::display::PowerGlyph;
    use crate::protocol::client::RelayClientError;
    use crate::protocol::messages::RelayStatus;

    #[derive(Default)]
    struct FakeRelay {
        status_replies: Mutex<VecDeque<Result<RelayStatus, RelayClientError>>>,
        toggle_replies: Mutex<VecDeque<Result<RelayStatus, RelayClientError>>>,
        status_calls: AtomicUsize,
        toggle_calls: AtomicUsize,
        /// When set, toggle requests block until notified.
        toggle_gate: Option<Arc<Notify>>,
    }

    impl FakeRelay {
        fn on_status(&self, reply: Result<RelayStatus, RelayClientError>) {
            self.status_replies.lock().push_back(reply);
        }

        fn on_toggle(&self, reply: Result<RelayStatus, RelayClientError>) {
            self.toggle_replies.lock().push_back(reply);
        }
    }

    #[async_trait]
    impl RelayTransport for FakeRelay {
        async fn status(&self) -> Result<RelayStatus, RelayClientError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status_replies
                .lock()
                .pop_front()
                .unwrap_or(Ok(RelayStatus { relay_on: false }))
        }

        async fn toggle(&self, action: RelayAction) -> Result<RelayStatus, RelayClientError> {
            self.toggle_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.toggle_gate {
                gate.notified().await;
            }
            self.toggle_replies
                .lock()
                .pop_front()
                .unwrap_or(Ok(RelayStatus {
                    relay_on: action.is_on(),
                }))
        }
    }

    #[tokio::test]
    async fn test_overlapping_actions_send_one_request() {
        let gate = Arc::new(Notify::new());
        let relay = Arc::new(FakeRelay {
            toggle_gate: Some(gate.clone()),
            ..Default::default()
        });
        let controller = SwitchController::new(relay.clone());

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.request_action(RelayAction::On).await })
        };
        // Let the first action reach its network call.
        while relay.toggle_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Second command while the first is in flight is a no-op.
        controller.request_action(RelayAction::Off).await;
        assert_eq!(relay.toggle_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        first.await.unwrap();
        assert_eq!(relay.toggle_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_busy_guard_released_on_success_and_failure() {
        let relay = Arc::new(FakeRelay::default());
        relay.on_toggle(Ok(RelayStatus { relay_on: true }));
        relay.on_toggle(Err(RelayClientError::Transport(
            "connection refused".to_string(),
        )));
        let controller = SwitchController::new(relay.clone());

        controller.request_action(RelayAction::On).await;
        assert!(!controller.inner.busy.load(Ordering::SeqCst));

        controller.request_action(RelayAction::Off).await;
        assert!(!controller.inner.busy.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_optimistic_update_precedes_network_reply() {
        let gate = Arc::new(Notify::new());
        let relay = Arc::new(FakeRelay {
            toggle_gate: Some(gate.clone()),
            ..Default::default()
        });
        // Start offline so the optimistic overwrite has something to clear.
        relay.on_status(Err(RelayClientError::Transport("unreachable".to_string())));
        let controller = SwitchController::new(relay.clone());
        controller.poll_status().await;
        assert!(controller.frame().offline);

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.request_action(RelayAction::On).await })
        };
        while relay.toggle_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Displayed state already reflects the requested target while
        // the toggle request is still in flight.
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::On);
        assert!(frame.toggle_checked);
        assert!(!frame.offline);
        assert_eq!(frame.pressed, Some(RelayAction::On));

        gate.notify_one();
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_reply_overrides_optimistic_state() {
        let relay = Arc::new(FakeRelay::default());
        relay.on_toggle(Ok(RelayStatus { relay_on: false }));
        let controller = SwitchController::new(relay);

        controller.request_action(RelayAction::On).await;
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::Off);
        assert!(!frame.toggle_checked);
    }

    #[tokio::test]
    async fn test_poll_failure_adds_offline_overlay() {
        let relay = Arc::new(FakeRelay::default());
        relay.on_status(Ok(RelayStatus { relay_on: true }));
        relay.on_status(Err(RelayClientError::Transport("unreachable".to_string())));
        let controller = SwitchController::new(relay);

        controller.poll_status().await;
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::On);
        assert!(!frame.offline);

        controller.poll_status().await;
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::On);
        assert!(frame.offline);
    }

    #[tokio::test]
    async fn test_failed_action_triggers_single_resync_poll() {
        let relay = Arc::new(FakeRelay::default());
        relay.on_toggle(Err(RelayClientError::Transport(
            "connection reset".to_string(),
        )));
        relay.on_status(Ok(RelayStatus { relay_on: true }));
        let controller = SwitchController::new(relay.clone());

        controller.request_action(RelayAction::Off).await;
        assert_eq!(relay.status_calls.load(Ordering::SeqCst), 1);

        // The resync poll wins over the failed optimistic guess, and no
        // offline overlay appears on the action path.
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::On);
        assert!(!frame.offline);
    }

    #[tokio::test]
    async fn test_load_offline_recover_scenario() {
        let relay = Arc::new(FakeRelay::default());
        relay.on_status(Ok(RelayStatus { relay_on: true }));
        relay.on_status(Err(RelayClientError::Transport("unreachable".to_string())));
        relay.on_status(Ok(RelayStatus { relay_on: false }));
        let controller = SwitchController::new(relay);

        controller.poll_status().await;
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::On);
        assert!(!frame.offline);

        controller.poll_status().await;
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::On);
        assert!(frame.offline);

        controller.poll_status().await;
        let frame = controller.frame();
        assert_eq!(frame.power, PowerGlyph::Off);
        assert!(!frame.offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pressed_marker_clears_after_flash() {
        let relay = Arc::new(FakeRelay::default());
        let controller = SwitchController::new(relay);

        controller.request_action(RelayAction::On).await;
        assert_eq!(controller.frame().pressed, Some(RelayAction::On));

        tokio::time::sleep(DEFAULT_PRESS_FLASH + Duration::from_millis(50)).await;
        assert_eq!(controller.frame().pressed, None);
    }

    #[tokio::test]
    async fn test_subscribers_observe_reconciled_frames() {
        let relay = Arc::new(FakeRelay::default());
        relay.on_status(Ok(RelayStatus { relay_on: true }));
        let controller = SwitchController::new(relay);
        let mut rx = controller.subscribe();

        assert_eq!(rx.borrow().power, PowerGlyph::Unknown);
        controller.poll_status().await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().power, PowerGlyph::On);
    }
}
