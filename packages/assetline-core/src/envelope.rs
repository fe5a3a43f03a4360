//! RPC envelope codec.
//!
//! An envelope is the JSON document carried in a bus message payload. It is
//! tagged by `kind`, may carry a serialized span carrier in `span`, and holds
//! the kind-specific payload as fields flattened next to the tag:
//!
//! ```json
//! {"kind":"getAlarm","span":"{\"traceparent\":\"00-...\"}","id":"aaaa-aaaa"}
//! ```
//!
//! Replies echo `kind` and carry either the success payload or an `error`
//! string. The bus has no status channel, so the presence of `error` is the
//! only failure signal a requester gets.

use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field names owned by the envelope itself. Payloads may not use them.
pub const RESERVED_FIELDS: [&str; 3] = ["kind", "span", "error"];

/// Errors produced while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The bytes are not a JSON object with a string `kind`.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// A payload serialized to something other than a JSON object.
    #[error("payload for {kind} is not a JSON object")]
    PayloadNotObject { kind: String },
    /// A payload field collides with an envelope field.
    #[error("payload for {kind} uses reserved field `{field}`")]
    ReservedField { kind: String, field: String },
    /// The fields do not match the payload type requested by the caller.
    #[error("invalid payload for {kind}: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// A request or response document exchanged over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation tag selecting the handler and the response shape.
    pub kind: String,
    /// JSON-encoded span carrier; empty means "no parent span".
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "null_as_empty"
    )]
    pub span: String,
    /// Rendered handler error. Only present on failed replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Kind-specific payload fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Treats an explicit `null` span the same as an absent one.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Envelope {
    /// Builds an envelope carrying `payload` as its fields.
    ///
    /// # Errors
    ///
    /// Returns `PayloadNotObject` if the payload does not serialize to a JSON
    /// object, `ReservedField` if it uses `kind`, `span` or `error`, and
    /// `Serialize` if serialization itself fails.
    pub fn new<T: Serialize + ?Sized>(kind: &str, payload: &T) -> Result<Self, EnvelopeError> {
        let value = serde_json::to_value(payload).map_err(EnvelopeError::Serialize)?;
        let Value::Object(fields) = value else {
            return Err(EnvelopeError::PayloadNotObject {
                kind: kind.to_string(),
            });
        };

        if let Some(field) = RESERVED_FIELDS.iter().find(|f| fields.contains_key(**f)) {
            return Err(EnvelopeError::ReservedField {
                kind: kind.to_string(),
                field: (*field).to_string(),
            });
        }

        Ok(Self {
            kind: kind.to_string(),
            span: String::new(),
            error: None,
            fields,
        })
    }

    /// Builds a failed reply for `kind`. The payload is omitted.
    #[must_use]
    pub fn failure(kind: &str, error: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            span: String::new(),
            error: Some(error.into()),
            fields: Map::new(),
        }
    }

    /// Attaches a serialized span carrier.
    #[must_use]
    pub fn with_span(mut self, span: String) -> Self {
        self.span = span;
        self
    }

    /// Returns `true` if this is a failed reply.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Deserializes the payload fields into `T`.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Payload` if the fields do not match `T`.
    pub fn into_payload<T: DeserializeOwned>(self) -> Result<T, EnvelopeError> {
        let kind = self.kind;
        serde_json::from_value(Value::Object(self.fields))
            .map_err(|source| EnvelopeError::Payload { kind, source })
    }

    /// Serializes the envelope to bus payload bytes.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Serialize` if a field value cannot be rendered.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(EnvelopeError::Serialize)
    }
}

/// Decodes a bus payload into an envelope.
///
/// # Errors
///
/// Returns `EnvelopeError::Malformed` if the bytes are not a JSON object or
/// carry no string `kind`.
pub fn decode(bytes: &[u8]) -> Result<Envelope, EnvelopeError> {
    serde_json::from_slice(bytes).map_err(EnvelopeError::Malformed)
}

/// Encodes a reply for `kind` from a handler outcome.
///
/// On success the payload fields are flattened next to `kind`; on failure only
/// the rendered error is embedded.
///
/// # Errors
///
/// Propagates the errors of [`Envelope::new`] for a success payload that is not
/// a plain JSON object.
pub fn encode<T, E>(kind: &str, outcome: &Result<T, E>) -> Result<Vec<u8>, EnvelopeError>
where
    T: Serialize,
    E: Display,
{
    let envelope = match outcome {
        Ok(payload) => Envelope::new(kind, payload)?,
        Err(error) => Envelope::failure(kind, error.to_string()),
    };
    envelope.to_bytes()
}
