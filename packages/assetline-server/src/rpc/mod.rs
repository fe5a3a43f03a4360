//! Request/reply RPC over the message bus.

pub mod client;
pub mod dispatcher;
pub mod latency;
pub mod table;

pub use client::{ClientError, RpcClient};
pub use dispatcher::{DispatchError, DispatcherConfig, RpcDispatcher};
pub use latency::{LatencyLayer, LatencyRecorder, MetricsLatencyRecorder};
pub use table::{DispatchTable, DispatchTableBuilder, Handler, HandlerError, RpcRequest};
