//! Per-listener shutdown controller with in-flight tracking.
//!
//! Uses `ArcSwap` for lock-free health state transitions and an atomic
//! counter with RAII guards for in-flight work. A second watch channel
//! reports when the listener's serve loop has actually returned, so `stop`
//! can wait for it before releasing shared resources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::time::Instant;

/// Listener health state.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Bound but not yet serving.
    Starting,
    /// Serving requests.
    Ready,
    /// Stop requested; in-flight work is finishing.
    Draining,
    /// All in-flight work completed.
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Coordinates graceful stop of a single listener:
/// 1. probes read `health_state()`
/// 2. `trigger_shutdown()` moves to Draining and wakes the serve loop
/// 3. the serve loop calls `mark_serve_exited()` on its way out
/// 4. `wait_for_drain()` waits for in-flight work to complete
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    serve_exited: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    health_state: Arc<ArcSwap<HealthState>>,
}

impl ShutdownController {
    /// Creates a new controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown_signal, _) = watch::channel(false);
        let (serve_exited, _) = watch::channel(false);
        Self {
            shutdown_signal,
            serve_exited,
            in_flight: Arc::new(AtomicU64::new(0)),
            health_state: Arc::new(ArcSwap::from_pointee(HealthState::Starting)),
        }
    }

    /// Transitions to `Ready`. Ignored once shutdown has been triggered.
    pub fn set_ready(&self) {
        if !self.is_shutdown_triggered() {
            self.health_state.store(Arc::new(HealthState::Ready));
        }
    }

    /// Returns a receiver that flips to `true` when shutdown is triggered.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Moves to `Draining` and signals every shutdown receiver.
    pub fn trigger_shutdown(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
        self.shutdown_signal.send_replace(true);
    }

    #[must_use]
    pub fn is_shutdown_triggered(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    /// Records that the serve loop has returned.
    pub fn mark_serve_exited(&self) {
        self.serve_exited.send_replace(true);
    }

    /// Waits until the serve loop has returned or `deadline` passes.
    ///
    /// Returns `false` on timeout.
    pub async fn wait_serve_exited(&self, deadline: Instant) -> bool {
        let mut rx = self.serve_exited.subscribe();
        tokio::time::timeout_at(deadline, rx.wait_for(|exited| *exited))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// Creates an RAII guard that tracks one unit of in-flight work.
    ///
    /// The counter is decremented when the guard drops, even on panic.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits for in-flight work to complete, up to `deadline`.
    ///
    /// Returns `true` and transitions to `Stopped` if everything drained.
    /// Returns `false` if the deadline passed (state stays `Draining`).
    pub async fn wait_for_drain(&self, deadline: Instant) -> bool {
        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                self.health_state.store(Arc::new(HealthState::Stopped));
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `rx` reads `true`, or its sender is gone.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    // wait_for checks the current value first, so a shutdown triggered
    // before the receiver was created is not missed.
    let _ = rx.wait_for(|triggered| *triggered).await;
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
