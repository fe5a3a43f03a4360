//! Multi-listener lifecycle coordinator.
//!
//! Binds every listener, serves them concurrently next to an OS signal
//! watcher, and tears everything down on the first trigger: a signal, a
//! listener failure or unexpected exit, or an explicit [`ShutdownHandle`]
//! request. Teardown runs exactly once under a single shared deadline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::{signals, Closer, Listener};
use crate::config::LifecycleConfig;

/// Extra time a listener's `stop` may overrun the shared deadline while it
/// finishes releasing resources.
const CLEANUP_GRACE: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Coordinator state. Transitions only move forward; a stopped coordinator
/// cannot be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Why a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// An OS signal, by name.
    Signal(String),
    /// [`ShutdownHandle::request`] or [`Coordinator::stop`] was called.
    Requested,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("coordinator was already started")]
    AlreadyStarted,
    #[error("failed to bind listener {listener}: {source}")]
    Bind {
        listener: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("listener {listener} failed: {source}")]
    Listener {
        listener: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("listener {listener} exited without a shutdown request")]
    ListenerExited { listener: String },
    #[error("signal handling failed: {0}")]
    Signal(#[source] anyhow::Error),
    #[error("shutdown step {step} failed: {source}")]
    Shutdown {
        step: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Cloneable handle that asks a running coordinator to shut down.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: mpsc::Sender<Trigger>,
}

impl ShutdownHandle {
    /// Requests shutdown. Extra requests after the first are ignored.
    pub fn request(&self) {
        let _ = self.tx.try_send(Trigger::Requested);
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Trigger {
    Signal(String),
    SignalError(anyhow::Error),
    Requested,
    ListenerFailed {
        listener: String,
        error: anyhow::Error,
    },
    ListenerExited {
        listener: String,
    },
}

impl Trigger {
    fn describe(&self) -> String {
        match self {
            Self::Signal(name) => format!("signal {name}"),
            Self::SignalError(_) => "signal handler failure".to_string(),
            Self::Requested => "explicit request".to_string(),
            Self::ListenerFailed { listener, .. } => format!("listener {listener} failed"),
            Self::ListenerExited { listener } => format!("listener {listener} exited"),
        }
    }
}

type SignalFuture = BoxFuture<'static, anyhow::Result<String>>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects listeners, closers, and the signal source for a [`Coordinator`].
#[derive(Default)]
pub struct CoordinatorBuilder {
    config: LifecycleConfig,
    listeners: Vec<Arc<dyn Listener>>,
    closers: Vec<Arc<dyn Closer>>,
    signal: Option<SignalFuture>,
}

impl CoordinatorBuilder {
    #[must_use]
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Adds a listener. Listeners stop in the order they were added.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Adds a closer, run after every listener has stopped.
    #[must_use]
    pub fn closer(mut self, closer: Arc<dyn Closer>) -> Self {
        self.closers.push(closer);
        self
    }

    /// Replaces the OS signal watcher. The future resolves with the name of
    /// the signal that fired.
    #[must_use]
    pub fn signal<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        self.signal = Some(Box::pin(signal));
        self
    }

    #[must_use]
    pub fn build(self) -> Coordinator {
        // One slot per listener, one for the signal watcher, one for requests,
        // so every source can report without blocking.
        let (tx, rx) = mpsc::channel(self.listeners.len() + 2);
        let signal = self
            .signal
            .unwrap_or_else(|| Box::pin(signals::wait_for_signal()));

        Coordinator {
            config: self.config,
            listeners: self.listeners,
            closers: self.closers,
            state: ArcSwap::from_pointee(LifecycleState::Created),
            stopping: Arc::new(AtomicBool::new(false)),
            stopped: watch::channel(false).0,
            trigger_tx: tx,
            trigger_rx: Mutex::new(Some(rx)),
            signal: Mutex::new(Some(signal)),
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Runs a set of listeners until the first shutdown trigger.
pub struct Coordinator {
    config: LifecycleConfig,
    listeners: Vec<Arc<dyn Listener>>,
    closers: Vec<Arc<dyn Closer>>,
    state: ArcSwap<LifecycleState>,
    stopping: Arc<AtomicBool>,
    stopped: watch::Sender<bool>,
    trigger_tx: mpsc::Sender<Trigger>,
    trigger_rx: Mutex<Option<mpsc::Receiver<Trigger>>>,
    signal: Mutex<Option<SignalFuture>>,
}

impl Coordinator {
    #[must_use]
    pub fn builder(config: LifecycleConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        **self.state.load()
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.trigger_tx.clone(),
        }
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(Arc::new(state));
    }

    /// Binds and serves every listener, blocking until shutdown completes.
    ///
    /// # Errors
    ///
    /// - `Bind` if a listener fails to bind (already-bound listeners are
    ///   stopped first)
    /// - `Listener` / `ListenerExited` if a listener fails or returns on its own
    /// - `Signal` if the signal watcher fails
    /// - `Shutdown` if a signal or request triggered shutdown and a stop step
    ///   failed
    /// - `AlreadyStarted` on a second call
    pub async fn start(&self) -> Result<ShutdownCause, LifecycleError> {
        let Some(mut triggers) = self.trigger_rx.lock().take() else {
            return Err(LifecycleError::AlreadyStarted);
        };
        self.set_state(LifecycleState::Starting);

        for listener in &self.listeners {
            if let Err(source) = listener.bind().await {
                let name = listener.name().to_string();
                error!(listener = %name, error = %source, "listener bind failed");
                if let Err(e) = self.stop().await {
                    warn!(error = %e, "cleanup after bind failure reported an error");
                }
                return Err(LifecycleError::Bind {
                    listener: name,
                    source,
                });
            }
            info!(listener = listener.name(), "listener bound");
        }

        self.set_state(LifecycleState::Running);
        let mut tasks = JoinSet::new();

        for listener in &self.listeners {
            let listener = Arc::clone(listener);
            let tx = self.trigger_tx.clone();
            let stopping = Arc::clone(&self.stopping);
            tasks.spawn(async move {
                let name = listener.name().to_string();
                let trigger = match listener.serve().await {
                    // Returned because `stop` was called on the coordinator.
                    Ok(()) if stopping.load(Ordering::SeqCst) => Trigger::Requested,
                    Ok(()) => Trigger::ListenerExited { listener: name },
                    Err(error) => Trigger::ListenerFailed {
                        listener: name,
                        error,
                    },
                };
                let _ = tx.try_send(trigger);
            });
        }

        let signal = self.signal.lock().take();
        if let Some(signal) = signal {
            let tx = self.trigger_tx.clone();
            tasks.spawn(async move {
                let trigger = match signal.await {
                    Ok(name) => Trigger::Signal(name),
                    Err(e) => Trigger::SignalError(e),
                };
                let _ = tx.try_send(trigger);
            });
        }

        info!(listeners = self.listeners.len(), "service running");

        // The coordinator holds a sender, so the channel never closes here.
        let trigger = triggers.recv().await.unwrap_or(Trigger::Requested);
        info!(trigger = %trigger.describe(), "shutdown triggered");

        let stopped = self.stop().await;
        tasks.shutdown().await;

        match trigger {
            Trigger::Signal(name) => stopped.map(|()| ShutdownCause::Signal(name)),
            Trigger::Requested => stopped.map(|()| ShutdownCause::Requested),
            Trigger::SignalError(e) => Err(LifecycleError::Signal(e)),
            Trigger::ListenerFailed { listener, error } => Err(LifecycleError::Listener {
                listener,
                source: error,
            }),
            Trigger::ListenerExited { listener } => {
                Err(LifecycleError::ListenerExited { listener })
            }
        }
    }

    /// Stops every listener in registration order, then runs every closer.
    ///
    /// Runs once. Calling it on a running coordinator is an explicit shutdown
    /// request: `start` then returns `Ok(ShutdownCause::Requested)`. Later
    /// calls wait for the first to finish and return `Ok(())`. All steps share
    /// one deadline of `now + shutdown_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Shutdown` for the first step that failed or overran the
    /// deadline. Later steps still run.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        if self.stopping.swap(true, Ordering::SeqCst) {
            let mut stopped = self.stopped.subscribe();
            // The coordinator owns the sender, so this cannot fail.
            let _ = stopped.wait_for(|done| *done).await;
            return Ok(());
        }
        self.set_state(LifecycleState::Stopping);

        let deadline = Instant::now() + self.config.shutdown_timeout;
        let mut first_error: Option<LifecycleError> = None;

        for listener in &self.listeners {
            let name = listener.name().to_string();
            let outcome =
                tokio::time::timeout_at(deadline + CLEANUP_GRACE, listener.stop(deadline)).await;
            let failure = match outcome {
                Ok(Ok(())) => {
                    info!(listener = %name, "listener stopped");
                    None
                }
                Ok(Err(e)) => Some(e),
                Err(_) => Some(anyhow::anyhow!("stop did not finish before the deadline")),
            };
            if let Some(source) = failure {
                error!(listener = %name, error = %source, "listener stop failed");
                first_error.get_or_insert(LifecycleError::Shutdown { step: name, source });
            }
        }

        for closer in &self.closers {
            let name = closer.name().to_string();
            let outcome = tokio::time::timeout_at(deadline + CLEANUP_GRACE, closer.close()).await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(_) => Some(anyhow::anyhow!("close did not finish before the deadline")),
            };
            if let Some(source) = failure {
                error!(closer = %name, error = %source, "closer failed");
                first_error.get_or_insert(LifecycleError::Shutdown { step: name, source });
            }
        }

        self.set_state(LifecycleState::Stopped);
        self.stopped.send_replace(true);
        match first_error {
            None => {
                info!("shutdown complete");
                Ok(())
            }
            Some(e) => {
                warn!(error = %e, "shutdown completed with errors");
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;

    use super::*;
    use crate::lifecycle::{wait_for_shutdown, ShutdownController};

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Clone, Copy)]
    enum Serve {
        UntilStopped,
        FailAfter(Duration),
        ExitAfter(Duration),
    }

    struct StubListener {
        name: &'static str,
        fail_bind: bool,
        serve: Serve,
        hang_on_stop: bool,
        control: ShutdownController,
        serve_calls: AtomicU32,
        stop_calls: AtomicU32,
        log: Log,
    }

    impl StubListener {
        fn new(name: &'static str, serve: Serve, log: &Log) -> Self {
            Self {
                name,
                fail_bind: false,
                serve,
                hang_on_stop: false,
                control: ShutdownController::new(),
                serve_calls: AtomicU32::new(0),
                stop_calls: AtomicU32::new(0),
                log: Arc::clone(log),
            }
        }
    }

    #[async_trait]
    impl Listener for StubListener {
        fn name(&self) -> &str {
            self.name
        }

        async fn bind(&self) -> anyhow::Result<()> {
            self.log.lock().push(format!("bind:{}", self.name));
            if self.fail_bind {
                anyhow::bail!("address in use");
            }
            Ok(())
        }

        async fn serve(&self) -> anyhow::Result<()> {
            self.serve_calls.fetch_add(1, Ordering::SeqCst);
            match self.serve {
                Serve::UntilStopped => {
                    let mut rx = self.control.shutdown_receiver();
                    wait_for_shutdown(&mut rx).await;
                    Ok(())
                }
                Serve::FailAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    anyhow::bail!("connection lost")
                }
                Serve::ExitAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            }
        }

        async fn stop(&self, _deadline: Instant) -> anyhow::Result<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().push(format!("stop:{}", self.name));
            self.control.trigger_shutdown();
            if self.hang_on_stop {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    struct StubCloser {
        name: &'static str,
        fail: bool,
        log: Log,
    }

    #[async_trait]
    impl Closer for StubCloser {
        fn name(&self) -> &str {
            self.name
        }

        async fn close(&self) -> anyhow::Result<()> {
            self.log.lock().push(format!("close:{}", self.name));
            if self.fail {
                anyhow::bail!("exporter unreachable");
            }
            Ok(())
        }
    }

    fn never() -> impl Future<Output = anyhow::Result<String>> + Send + 'static {
        std::future::pending()
    }

    fn after(delay: Duration) -> impl Future<Output = anyhow::Result<String>> + Send + 'static {
        async move {
            tokio::time::sleep(delay).await;
            Ok("SIGTERM".to_string())
        }
    }

    fn closer(name: &'static str, fail: bool, log: &Log) -> Arc<StubCloser> {
        Arc::new(StubCloser {
            name,
            fail,
            log: Arc::clone(log),
        })
    }

    fn stops(log: &Log) -> Vec<String> {
        log.lock()
            .iter()
            .filter(|e| !e.starts_with("bind:"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn signal_stops_listeners_in_order_then_closers() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new("rpc", Serve::UntilStopped, &log));
        let admin = Arc::new(StubListener::new("admin", Serve::UntilStopped, &log));

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc.clone())
            .listener(admin.clone())
            .closer(closer("tracer", false, &log))
            .signal(after(Duration::from_millis(20)))
            .build();

        let cause = coordinator.start().await.unwrap();

        assert_eq!(cause, ShutdownCause::Signal("SIGTERM".to_string()));
        assert_eq!(stops(&log), vec!["stop:rpc", "stop:admin", "close:tracer"]);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn listener_failure_returns_listener_error() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new(
            "rpc",
            Serve::FailAfter(Duration::from_millis(10)),
            &log,
        ));
        let admin = Arc::new(StubListener::new("admin", Serve::UntilStopped, &log));

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc.clone())
            .listener(admin.clone())
            .signal(never())
            .build();

        let err = coordinator.start().await.unwrap_err();

        assert!(matches!(err, LifecycleError::Listener { ref listener, .. } if listener == "rpc"));
        assert_eq!(rpc.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(admin.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_triggers_stop_exactly_once() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new(
            "rpc",
            Serve::FailAfter(Duration::ZERO),
            &log,
        ));
        let admin = Arc::new(StubListener::new(
            "admin",
            Serve::FailAfter(Duration::ZERO),
            &log,
        ));

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc.clone())
            .listener(admin.clone())
            .closer(closer("tracer", false, &log))
            .signal(after(Duration::ZERO))
            .build();
        coordinator.shutdown_handle().request();

        let _ = coordinator.start().await;
        coordinator.stop().await.unwrap();

        assert_eq!(rpc.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(admin.stop_calls.load(Ordering::SeqCst), 1);
        let closes = log.lock().iter().filter(|e| *e == "close:tracer").count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn explicit_request_shuts_down_cleanly() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new("rpc", Serve::UntilStopped, &log));

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc)
            .signal(never())
            .build();
        let handle = coordinator.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.request();
        });

        assert_eq!(coordinator.start().await.unwrap(), ShutdownCause::Requested);
    }

    #[tokio::test]
    async fn external_stop_is_a_requested_shutdown() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new("rpc", Serve::UntilStopped, &log));
        let admin = Arc::new(StubListener::new("admin", Serve::UntilStopped, &log));

        let coordinator = Arc::new(
            Coordinator::builder(LifecycleConfig::default())
                .listener(rpc.clone())
                .listener(admin.clone())
                .closer(closer("tracer", false, &log))
                .signal(never())
                .build(),
        );

        let running = Arc::clone(&coordinator);
        let log_at_return = Arc::clone(&log);
        let started = tokio::spawn(async move {
            let outcome = running.start().await;
            (outcome, stops(&log_at_return))
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.stop().await.unwrap();

        let (outcome, stopped_before_return) = started.await.unwrap();
        assert_eq!(outcome.unwrap(), ShutdownCause::Requested);
        // `start` only returns once the whole stop sequence has run.
        assert_eq!(
            stopped_before_return,
            vec!["stop:rpc", "stop:admin", "close:tracer"]
        );
        assert_eq!(rpc.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn second_stop_waits_for_the_first() {
        let log = Log::default();
        let mut rpc = StubListener::new("rpc", Serve::UntilStopped, &log);
        rpc.hang_on_stop = true;

        let config = LifecycleConfig {
            shutdown_timeout: Duration::from_millis(50),
        };
        let coordinator = Arc::new(
            Coordinator::builder(config)
                .listener(Arc::new(rpc))
                .closer(closer("tracer", false, &log))
                .signal(never())
                .build(),
        );

        let first = Arc::clone(&coordinator);
        let first = tokio::spawn(async move { first.stop().await });
        tokio::time::sleep(Duration::from_millis(5)).await;

        coordinator.stop().await.unwrap();
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
        assert!(log.lock().iter().any(|e| e == "close:tracer"));
        assert!(first.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn bind_failure_stops_everything_without_serving() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new("rpc", Serve::UntilStopped, &log));
        let mut admin = StubListener::new("admin", Serve::UntilStopped, &log);
        admin.fail_bind = true;
        let admin = Arc::new(admin);

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc.clone())
            .listener(admin.clone())
            .signal(never())
            .build();

        let err = coordinator.start().await.unwrap_err();

        assert!(matches!(err, LifecycleError::Bind { ref listener, .. } if listener == "admin"));
        assert_eq!(rpc.serve_calls.load(Ordering::SeqCst), 0);
        assert_eq!(rpc.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(admin.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn listener_returning_unasked_is_an_error() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new(
            "rpc",
            Serve::ExitAfter(Duration::from_millis(5)),
            &log,
        ));

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc)
            .signal(never())
            .build();

        let err = coordinator.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::ListenerExited { ref listener } if listener == "rpc"));
    }

    #[tokio::test]
    async fn failing_closer_surfaces_after_signal() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new("rpc", Serve::UntilStopped, &log));

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc)
            .closer(closer("tracer", true, &log))
            .closer(closer("logs", false, &log))
            .signal(after(Duration::from_millis(5)))
            .build();

        let err = coordinator.start().await.unwrap_err();

        assert!(matches!(err, LifecycleError::Shutdown { ref step, .. } if step == "tracer"));
        assert_eq!(stops(&log), vec!["stop:rpc", "close:tracer", "close:logs"]);
    }

    #[tokio::test]
    async fn signal_handler_failure_is_reported() {
        let log = Log::default();
        let rpc = Arc::new(StubListener::new("rpc", Serve::UntilStopped, &log));

        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(rpc.clone())
            .signal(async { Err(anyhow::anyhow!("no signal support")) })
            .build();

        let err = coordinator.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Signal(_)));
        assert_eq!(rpc.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_stop_is_bounded_by_deadline() {
        let log = Log::default();
        let mut rpc = StubListener::new("rpc", Serve::UntilStopped, &log);
        rpc.hang_on_stop = true;
        let admin = Arc::new(StubListener::new("admin", Serve::UntilStopped, &log));

        let config = LifecycleConfig {
            shutdown_timeout: Duration::from_millis(100),
        };
        let coordinator = Coordinator::builder(config)
            .listener(Arc::new(rpc))
            .listener(admin.clone())
            .signal(after(Duration::from_millis(5)))
            .build();

        let err = coordinator.start().await.unwrap_err();

        assert!(matches!(err, LifecycleError::Shutdown { ref step, .. } if step == "rpc"));
        assert_eq!(admin.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let log = Log::default();
        let coordinator = Coordinator::builder(LifecycleConfig::default())
            .listener(Arc::new(StubListener::new("rpc", Serve::UntilStopped, &log)))
            .signal(after(Duration::ZERO))
            .build();

        coordinator.start().await.unwrap();
        assert!(matches!(
            coordinator.start().await.unwrap_err(),
            LifecycleError::AlreadyStarted
        ));
    }
}
