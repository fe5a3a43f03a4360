//! Asset domain services behind the RPC handlers.
//!
//! The transport core only depends on these traits; `InMemoryAssetStore` is a
//! pass-through CRUD implementation of both.

pub mod memory;
pub mod routes;

pub use memory::InMemoryAssetStore;
pub use routes::asset_routes;

use assetline_core::messages::{Alarm, AlarmInput, Camera, CameraInput};
use async_trait::async_trait;
use opentelemetry::Context;

/// Errors returned by domain services. Rendered into the reply's `error`
/// field by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// CRUD over alarms. `cx` carries the active RPC span.
#[async_trait]
pub trait AlarmService: Send + Sync {
    async fn create(&self, cx: &Context, input: AlarmInput) -> Result<Alarm, DomainError>;

    async fn all(&self, cx: &Context, site_id: &str) -> Result<Vec<Alarm>, DomainError>;

    /// # Errors
    ///
    /// `NotFound` if no alarm has this id.
    async fn get(&self, cx: &Context, id: &str) -> Result<Alarm, DomainError>;

    /// Returns `false` when no alarm has this id.
    async fn update(&self, cx: &Context, id: &str, input: AlarmInput)
        -> Result<bool, DomainError>;

    /// Returns `false` when no alarm has this id.
    async fn delete(&self, cx: &Context, id: &str) -> Result<bool, DomainError>;
}

/// CRUD over cameras. Same contract as [`AlarmService`].
#[async_trait]
pub trait CameraService: Send + Sync {
    async fn create(&self, cx: &Context, input: CameraInput) -> Result<Camera, DomainError>;

    async fn all(&self, cx: &Context, site_id: &str) -> Result<Vec<Camera>, DomainError>;

    async fn get(&self, cx: &Context, id: &str) -> Result<Camera, DomainError>;

    async fn update(
        &self,
        cx: &Context,
        id: &str,
        input: CameraInput,
    ) -> Result<bool, DomainError>;

    async fn delete(&self, cx: &Context, id: &str) -> Result<bool, DomainError>;
}
