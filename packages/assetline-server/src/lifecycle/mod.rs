//! Process lifecycle: listeners, closers, and the coordinator that runs them.

pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use coordinator::{
    Coordinator, CoordinatorBuilder, LifecycleError, LifecycleState, ShutdownCause,
    ShutdownHandle,
};
pub use shutdown::{wait_for_shutdown, HealthState, InFlightGuard, ShutdownController};

use async_trait::async_trait;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Listener trait
// ---------------------------------------------------------------------------

/// A long-running server component managed by the [`Coordinator`].
///
/// Listeners are bound in registration order, served concurrently, and stopped
/// in registration order. All methods take `&self` because `serve` and `stop`
/// run concurrently on the same instance.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Short name used in logs and errors (e.g. `"rpc"`, `"admin"`).
    fn name(&self) -> &str;

    /// Opens sockets or subscriptions. Failing here aborts startup.
    async fn bind(&self) -> anyhow::Result<()>;

    /// Serves until `stop` is called. Returning `Ok` without a preceding
    /// `stop` is treated as an unexpected exit.
    async fn serve(&self) -> anyhow::Result<()>;

    /// Stops serving and releases resources, finishing by `deadline`.
    ///
    /// Must tolerate being called on a listener that was never bound.
    async fn stop(&self, deadline: Instant) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Closer trait
// ---------------------------------------------------------------------------

/// A resource released after every listener has stopped (tracer flush, etc.).
#[async_trait]
pub trait Closer: Send + Sync {
    fn name(&self) -> &str;

    async fn close(&self) -> anyhow::Result<()>;
}
