//! Client activity monitoring for adaptive polling.
//!
//! The monitor decides when the client is worth polling aggressively versus
//! safe to pause. It tracks two signals the host application feeds it:
//!
//! - **Visibility**: when the view goes hidden the engine is suspended
//!   (remembering whether it was polling); when it becomes visible again the
//!   engine resumes, either immediately or through the activity path.
//! - **Interaction**: pointer/keyboard/touch/scroll events, throttled to one
//!   per two seconds. An interaction while the engine is idle triggers one
//!   immediate fetch (so the view reflects fresh state without waiting a
//!   cycle) and schedules a resume of periodic polling shortly after.
//!
//! The first interaction of any kind sets a sticky `has_interacted` flag,
//! exposed for one-time effects outside this crate.
//!
//! All side effects are best-effort: fetch errors and scheduling races are
//! logged and swallowed so monitoring never takes down the host view.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::engine::PollingEngine;

/// Minimum gap between handled interactions.
pub const DEFAULT_INTERACTION_THROTTLE: Duration = Duration::from_secs(2);

/// Floor for the delayed-resume timer after an interaction.
pub const MIN_RESUME_DELAY: Duration = Duration::from_secs(1);

/// User interaction kinds the host can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    PointerMove,
    PointerDown,
    Click,
    KeyDown,
    TouchStart,
    Scroll,
}

/// Configuration for activity monitoring.
#[derive(Debug, Clone)]
pub struct ActivityConfig {
    /// Route visibility resume through the activity path instead of
    /// restarting the engine immediately
    pub resume_on_activity: bool,
    /// Minimum gap between handled interactions
    pub interaction_throttle: Duration,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            resume_on_activity: false,
            interaction_throttle: DEFAULT_INTERACTION_THROTTLE,
        }
    }
}

impl ActivityConfig {
    /// Enable or disable resume-on-activity mode.
    pub fn with_resume_on_activity(mut self, enabled: bool) -> Self {
        self.resume_on_activity = enabled;
        self
    }

    /// Set the interaction throttle window.
    pub fn with_interaction_throttle(mut self, throttle: Duration) -> Self {
        self.interaction_throttle = throttle;
        self
    }
}

/// Per-session activity state. Written only by the monitor, read by anyone.
struct MonitorState {
    hidden: bool,
    has_interacted: bool,
    /// Whether the engine was polling when the view went hidden
    was_polling: bool,
    last_interaction: Option<Instant>,
    /// Pending delayed-resume timer; canceled when the view hides
    resume_task: Option<JoinHandle<()>>,
}

/// Observes visibility and interaction signals and drives engine
/// suspend/resume accordingly.
pub struct ActivityMonitor {
    engine: PollingEngine,
    config: ActivityConfig,
    state: Mutex<MonitorState>,
}

impl ActivityMonitor {
    /// Create a monitor driving the given engine.
    pub fn new(engine: PollingEngine, config: ActivityConfig) -> Self {
        Self {
            engine,
            config,
            state: Mutex::new(MonitorState {
                hidden: false,
                has_interacted: false,
                was_polling: false,
                last_interaction: None,
                resume_task: None,
            }),
        }
    }

    /// Report a visibility change.
    ///
    /// Hiding suspends the engine, remembering whether it was polling, and
    /// cancels any pending delayed resume (suspend always wins over a
    /// scheduled resume). Becoming visible resumes the engine immediately if
    /// it was polling before hiding, or routes through the activity path when
    /// resume-on-activity mode is enabled.
    pub fn set_hidden(&self, hidden: bool) {
        if hidden {
            let was_polling = self.engine.is_polling();
            {
                let mut state = self.state.lock().unwrap();
                state.hidden = true;
                state.was_polling = was_polling;
                if let Some(task) = state.resume_task.take() {
                    task.abort();
                }
            }
            self.engine.stop();
            debug!(was_polling, "view hidden, polling suspended");
        } else {
            let was_polling = {
                let mut state = self.state.lock().unwrap();
                state.hidden = false;
                state.was_polling
            };
            debug!(was_polling, "view visible again");
            if self.config.resume_on_activity {
                self.activity_kick();
            } else if was_polling {
                self.engine.start();
            }
        }
    }

    /// Report a user interaction.
    ///
    /// The first call (of any kind) permanently sets `has_interacted` for
    /// the session; the polling side effects are throttled.
    pub fn on_interaction(&self, kind: Interaction) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.has_interacted {
                state.has_interacted = true;
                debug!(?kind, "first user interaction");
            }
        }
        self.activity_kick();
    }

    /// Whether the view is currently hidden.
    pub fn hidden(&self) -> bool {
        self.state.lock().unwrap().hidden
    }

    /// Whether any qualifying interaction has occurred this session. Sticky.
    pub fn has_interacted(&self) -> bool {
        self.state.lock().unwrap().has_interacted
    }

    /// Shared activity handling for interactions and resume-on-activity
    /// visibility changes: throttle, then one immediate manual fetch plus a
    /// delayed restart of periodic polling.
    fn activity_kick(&self) {
        let mut state = self.state.lock().unwrap();

        if state.hidden {
            return;
        }

        let now = Instant::now();
        if let Some(last) = state.last_interaction
            && now.duration_since(last) < self.config.interaction_throttle
        {
            return;
        }
        state.last_interaction = Some(now);

        if self.engine.is_polling() {
            return;
        }

        // Immediate non-polling fetch; failures are the engine retry path's
        // problem once polling resumes, so just log here.
        let engine = self.engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.poll_once().await {
                debug!(error = %e, "activity-triggered fetch failed");
            }
        });

        if let Some(task) = state.resume_task.take() {
            task.abort();
        }
        let delay = self.engine.interval().max(MIN_RESUME_DELAY);
        let engine = self.engine.clone();
        state.resume_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.start();
        }));
        debug!(?delay, "scheduled polling resume after activity");
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock()
            && let Some(task) = state.resume_task.take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, FetchKind, PollFetcher, PollOutcome, PollingEngine};
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fetcher that always reports active items and counts calls by kind.
    struct CountingFetcher {
        polling_calls: AtomicUsize,
        manual_calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                polling_calls: AtomicUsize::new(0),
                manual_calls: AtomicUsize::new(0),
            })
        }

        fn manual(&self) -> usize {
            self.manual_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PollFetcher for CountingFetcher {
        async fn poll(&self, kind: FetchKind) -> Result<PollOutcome> {
            if kind.is_polling() {
                self.polling_calls.fetch_add(1, Ordering::SeqCst);
            } else {
                self.manual_calls.fetch_add(1, Ordering::SeqCst);
            }
            Ok(PollOutcome::with_active(1))
        }
    }

    fn setup(
        resume_on_activity: bool,
    ) -> (Arc<CountingFetcher>, PollingEngine, ActivityMonitor) {
        let fetcher = CountingFetcher::new();
        let engine = PollingEngine::new(
            fetcher.clone(),
            EngineConfig::default().with_interval(Duration::from_millis(100)),
        );
        let monitor = ActivityMonitor::new(
            engine.clone(),
            ActivityConfig::default().with_resume_on_activity(resume_on_activity),
        );
        (fetcher, engine, monitor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_suspends_and_show_resumes() {
        let (_fetcher, engine, monitor) = setup(false);

        engine.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.is_polling());

        monitor.set_hidden(true);
        assert!(!engine.is_polling());
        assert!(monitor.hidden());

        monitor.set_hidden(false);
        assert!(engine.is_polling());
        assert!(!monitor.hidden());
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_does_not_start_if_was_not_polling() {
        let (_fetcher, engine, monitor) = setup(false);

        monitor.set_hidden(true);
        monitor.set_hidden(false);
        assert!(!engine.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interaction_fetches_then_resumes() {
        let (fetcher, engine, monitor) = setup(false);
        assert!(!engine.is_polling());

        monitor.on_interaction(Interaction::Click);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(fetcher.manual(), 1);
        assert!(!engine.is_polling());

        // Resume delay is max(1s, interval) = 1s
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(engine.is_polling());
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interaction_noop_while_polling() {
        let (fetcher, engine, monitor) = setup(false);

        engine.start();
        tokio::time::sleep(Duration::from_millis(10)).await;

        monitor.on_interaction(Interaction::KeyDown);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetcher.manual(), 0);
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interactions_are_throttled() {
        let (fetcher, engine, monitor) = setup(false);

        monitor.on_interaction(Interaction::PointerMove);
        monitor.on_interaction(Interaction::PointerMove);
        monitor.on_interaction(Interaction::Scroll);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetcher.manual(), 1);

        // Let the scheduled resume fire, then park the engine again
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(engine.is_polling());
        engine.stop();

        // Past the throttle window a new interaction is handled
        tokio::time::sleep(Duration::from_millis(1000)).await;
        monitor.on_interaction(Interaction::PointerMove);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetcher.manual(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_cancels_pending_resume() {
        let (_fetcher, engine, monitor) = setup(false);

        monitor.on_interaction(Interaction::Click);
        tokio::time::sleep(Duration::from_millis(500)).await;
        monitor.set_hidden(true);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!engine.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_has_interacted_is_sticky() {
        let (_fetcher, _engine, monitor) = setup(false);
        assert!(!monitor.has_interacted());

        monitor.on_interaction(Interaction::TouchStart);
        assert!(monitor.has_interacted());

        monitor.set_hidden(true);
        monitor.set_hidden(false);
        assert!(monitor.has_interacted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_on_activity_routes_through_kick() {
        let (fetcher, engine, monitor) = setup(true);

        engine.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        monitor.set_hidden(true);
        assert!(!engine.is_polling());

        monitor.set_hidden(false);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // No immediate restart; one manual fetch, then delayed resume
        assert_eq!(fetcher.manual(), 1);
        assert!(!engine.is_polling());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(engine.is_polling());
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interaction_while_hidden_is_ignored() {
        let (fetcher, engine, monitor) = setup(false);

        monitor.set_hidden(true);
        monitor.on_interaction(Interaction::Click);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(fetcher.manual(), 0);
        assert!(!engine.is_polling());
        // The sticky flag is still recorded
        assert!(monitor.has_interacted());
    }
}
