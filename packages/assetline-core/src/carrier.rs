//! Span carrier: trace context embedded in the envelope's `span` field.
//!
//! The bus has no header channel, so the propagator's text map is JSON-encoded
//! and stored as a string inside the envelope. The resulting wire value is JSON
//! nested in a JSON string field (double-encoded), which existing requesters
//! depend on.

use std::collections::HashMap;

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;

/// Errors from moving span contexts in and out of a carrier string.
#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("failed to inject span context: {0}")]
    Inject(#[source] serde_json::Error),
    #[error("failed to extract span context: {reason}")]
    Extract { reason: String },
}

/// Serializes the span context of `cx` into a carrier string.
///
/// A context without a valid span injects nothing and yields the empty string,
/// which [`deserialize`] reads back as "no parent".
///
/// # Errors
///
/// Returns `CarrierError::Inject` if the injected map cannot be encoded.
pub fn serialize(propagator: &dyn TextMapPropagator, cx: &Context) -> Result<String, CarrierError> {
    let mut carrier: HashMap<String, String> = HashMap::new();
    propagator.inject_context(cx, &mut carrier);

    if carrier.is_empty() {
        return Ok(String::new());
    }
    serde_json::to_string(&carrier).map_err(CarrierError::Inject)
}

/// Recovers a parent context from a carrier string.
///
/// Returns `Ok(None)` for an empty carrier (or an empty JSON map): the caller
/// should start a root span.
///
/// # Errors
///
/// Returns `CarrierError::Extract` if the string is not a JSON string map, or
/// if the propagator finds no valid remote span context in it.
pub fn deserialize(
    propagator: &dyn TextMapPropagator,
    carrier: &str,
) -> Result<Option<Context>, CarrierError> {
    if carrier.is_empty() {
        return Ok(None);
    }

    let map: HashMap<String, String> =
        serde_json::from_str(carrier).map_err(|e| CarrierError::Extract {
            reason: e.to_string(),
        })?;
    if map.is_empty() {
        return Ok(None);
    }

    let cx = propagator.extract(&map);
    if !cx.span().span_context().is_valid() {
        return Err(CarrierError::Extract {
            reason: "carrier holds no valid span context".to_string(),
        });
    }

    tracing::trace!(
        trace_id = %cx.span().span_context().trace_id(),
        "extracted parent span context"
    );
    Ok(Some(cx))
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use opentelemetry_sdk::trace::TracerProvider;

    use super::*;

    fn context_with_span(name: &'static str) -> Context {
        let provider = TracerProvider::builder().build();
        let tracer = provider.tracer("carrier-test");
        let span = tracer.start(name);
        Context::new().with_span(span)
    }

    #[test]
    fn round_trip_preserves_trace_id() {
        let propagator = TraceContextPropagator::new();
        let cx = context_with_span("spanA");
        let trace_id = cx.span().span_context().trace_id();

        let carrier = serialize(&propagator, &cx).unwrap();
        let parent = deserialize(&propagator, &carrier).unwrap().unwrap();

        assert_eq!(parent.span().span_context().trace_id(), trace_id);
        assert!(parent.span().span_context().is_remote());
    }

    #[test]
    fn carrier_is_json_text_map() {
        let propagator = TraceContextPropagator::new();
        let carrier = serialize(&propagator, &context_with_span("spanB")).unwrap();

        let map: HashMap<String, String> = serde_json::from_str(&carrier).unwrap();
        assert!(map.contains_key("traceparent"));
    }

    #[test]
    fn context_without_span_serializes_to_empty() {
        let propagator = TraceContextPropagator::new();
        let carrier = serialize(&propagator, &Context::new()).unwrap();
        assert!(carrier.is_empty());
    }

    #[test]
    fn empty_carrier_means_no_parent() {
        let propagator = TraceContextPropagator::new();
        assert!(deserialize(&propagator, "").unwrap().is_none());
        assert!(deserialize(&propagator, "{}").unwrap().is_none());
    }

    #[test]
    fn invalid_json_is_extract_error() {
        let propagator = TraceContextPropagator::new();
        let err = deserialize(&propagator, "traceparent=00-abc").unwrap_err();
        assert!(matches!(err, CarrierError::Extract { .. }));
    }

    #[test]
    fn unparseable_traceparent_is_extract_error() {
        let propagator = TraceContextPropagator::new();
        let err = deserialize(&propagator, r#"{"traceparent":"garbage"}"#).unwrap_err();
        assert!(matches!(err, CarrierError::Extract { .. }));
    }
}
