//! Dispatch table: maps an operation `kind` to its handler service.

use std::collections::HashMap;
use std::future::Future;

use opentelemetry::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tower::util::BoxCloneSyncService;
use tower::{service_fn, Service};

use crate::domain::DomainError;

// ---------------------------------------------------------------------------
// Request / error types
// ---------------------------------------------------------------------------

/// A decoded request handed to a handler.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    /// Context holding the server span for this message.
    pub cx: Context,
    pub kind: String,
    /// Envelope fields other than `kind`, `span` and `error`.
    pub fields: Map<String, Value>,
}

/// Handler failure. Rendered into the reply's `error` field.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid {kind} request: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Type-erased handler service.
pub type Handler = BoxCloneSyncService<RpcRequest, Value, HandlerError>;

// ---------------------------------------------------------------------------
// DispatchTable
// ---------------------------------------------------------------------------

/// Immutable `kind -> handler` map, built once before the dispatcher starts.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Handler>,
}

impl DispatchTable {
    #[must_use]
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    /// Returns a handle to the handler for `kind`.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Handler> {
        self.handlers.get(kind).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Collects handlers for a [`DispatchTable`]. Registering a kind twice
/// replaces the earlier handler.
#[derive(Default)]
pub struct DispatchTableBuilder {
    handlers: HashMap<String, Handler>,
}

impl DispatchTableBuilder {
    /// Registers a raw handler service for `kind`.
    #[must_use]
    pub fn register<S>(mut self, kind: &str, service: S) -> Self
    where
        S: Service<RpcRequest, Response = Value, Error = HandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.handlers
            .insert(kind.to_string(), BoxCloneSyncService::new(service));
        self
    }

    /// Registers a typed handler: the request fields are decoded into `Req`
    /// and the returned `Resp` is encoded back into a JSON object.
    #[must_use]
    pub fn route<Req, Resp, F, Fut>(self, kind: &str, handler: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Context, Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, DomainError>> + Send + 'static,
    {
        let service = service_fn(move |req: RpcRequest| {
            let handler = handler.clone();
            async move {
                let payload: Req = serde_json::from_value(Value::Object(req.fields))
                    .map_err(|source| HandlerError::InvalidPayload {
                        kind: req.kind,
                        source,
                    })?;
                let response = handler(req.cx, payload).await?;
                serde_json::to_value(response).map_err(HandlerError::Encode)
            }
        });
        self.register(kind, service)
    }

    #[must_use]
    pub fn build(self) -> DispatchTable {
        DispatchTable {
            handlers: self.handlers,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    #[derive(Deserialize)]
    struct Echo {
        text: String,
    }

    #[derive(Serialize)]
    struct Echoed {
        echoed: String,
    }

    fn table() -> DispatchTable {
        DispatchTable::builder()
            .route("echo", |_cx, req: Echo| async move {
                Ok::<_, DomainError>(Echoed { echoed: req.text })
            })
            .route("missing", |_cx, _req: Echo| async move {
                Err::<Echoed, _>(DomainError::NotFound {
                    entity: "thing",
                    id: "x".to_string(),
                })
            })
            .build()
    }

    fn request(kind: &str, fields: Value) -> RpcRequest {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object");
        };
        RpcRequest {
            cx: Context::new(),
            kind: kind.to_string(),
            fields,
        }
    }

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let table = table();
        let handler = table.get("echo").unwrap();

        let resp = handler
            .oneshot(request("echo", json!({ "text": "hi" })))
            .await
            .unwrap();
        assert_eq!(resp, json!({ "echoed": "hi" }));
    }

    #[tokio::test]
    async fn undecodable_fields_are_invalid_payload() {
        let handler = table().get("echo").unwrap();
        let err = handler
            .oneshot(request("echo", json!({ "text": 7 })))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload { ref kind, .. } if kind == "echo"));
    }

    #[tokio::test]
    async fn domain_error_renders_transparently() {
        let handler = table().get("missing").unwrap();
        let err = handler
            .oneshot(request("missing", json!({ "text": "a" })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "thing not found: x");
    }

    #[test]
    fn unknown_kind_has_no_handler() {
        let table = table();
        assert!(table.get("nope").is_none());
        assert!(!table.contains("nope"));
        assert_eq!(table.kinds(), vec!["echo", "missing"]);
    }
}
