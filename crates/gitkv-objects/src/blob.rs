use std::fmt;
use std::sync::Arc;

use gitkv_types::{Digest, DigestAlgorithm};
use serde_json::{Map, Value};

use crate::envelope;
use crate::error::{ObjectError, ObjectResult};
use crate::kind::ObjectKind;
use crate::registry::{BlobKind, BlobPayload, Fields, KindRegistry, NAME_FIELD, TYPE_FIELD};

/// Registry-tagged structured content (analogous to a git blob).
///
/// The canonical body is computed once at construction: the payload's
/// fields as compact JSON, without the reserved `name`/`__type__` fields,
/// followed by `__type__` carrying the kind tag. A decoded blob keeps the
/// exact body it was read from.
#[derive(Clone)]
pub struct Blob {
    tag: String,
    payload: Arc<dyn BlobPayload>,
    body: String,
}

impl Blob {
    /// Create a blob from a typed payload.
    pub fn new<T: BlobKind>(payload: T) -> ObjectResult<Self> {
        Self::from_payload(T::TAG, Arc::new(payload))
    }

    /// Create a default-kind blob from a field map.
    pub fn from_fields(fields: Map<String, Value>) -> ObjectResult<Self> {
        Self::new(Fields(fields))
    }

    /// Create a blob from an already type-erased payload.
    pub fn from_payload(
        tag: impl Into<String>,
        payload: Arc<dyn BlobPayload>,
    ) -> ObjectResult<Self> {
        let tag = tag.into();
        let body = canonical_body(&tag, payload.to_fields()?)?;
        Ok(Self { tag, payload, body })
    }

    /// Decode a blob body, reconstructing the payload through `registry`.
    pub fn decode(body: &[u8], registry: &KindRegistry) -> ObjectResult<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|_| ObjectError::parse("blob body is not UTF-8"))?;
        let Value::Object(fields) = serde_json::from_str::<Value>(text)
            .map_err(|e| ObjectError::parse(format!("blob body is not JSON: {e}")))?
        else {
            return Err(ObjectError::parse("blob body is not a JSON object"));
        };

        let tag = match fields.get(TYPE_FIELD) {
            Some(Value::String(tag)) => tag.clone(),
            Some(_) => return Err(ObjectError::parse("blob type tag is not a string")),
            None => return Err(ObjectError::parse("blob body has no type tag")),
        };
        let fields: Map<String, Value> = fields
            .into_iter()
            .filter(|(key, _)| key != TYPE_FIELD)
            .collect();
        let payload = registry.construct(&tag, fields)?;

        Ok(Self {
            tag,
            payload,
            body: text.to_string(),
        })
    }

    /// The registry tag of this blob's kind.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The payload, if it is a `T`.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref::<T>()
    }

    /// The type-erased payload.
    pub fn raw_payload(&self) -> &dyn BlobPayload {
        self.payload.as_ref()
    }

    /// Canonical body bytes.
    pub fn encode(&self) -> &[u8] {
        self.body.as_bytes()
    }

    /// Digest of this blob's envelope.
    pub fn digest(&self, algorithm: DigestAlgorithm) -> Digest {
        algorithm.hash(&envelope::wrap(ObjectKind::Blob, self.encode()))
    }
}

fn canonical_body(tag: &str, fields: Map<String, Value>) -> ObjectResult<String> {
    let mut body: Map<String, Value> = fields
        .into_iter()
        .filter(|(key, _)| key != NAME_FIELD && key != TYPE_FIELD)
        .collect();
    body.insert(TYPE_FIELD.to_string(), Value::String(tag.to_string()));
    serde_json::to_string(&Value::Object(body)).map_err(|e| ObjectError::Payload(e.to_string()))
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.body == other.body
    }
}

impl Eq for Blob {}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("tag", &self.tag)
            .field("body", &self.body)
            .finish()
    }
}
