//! Blob kind registry.
//!
//! A blob body records which registered kind produced it in a reserved
//! `__type__` field. On decode the registry maps that tag back to a
//! constructor, so applications can store their own payload types without
//! the object model knowing about them.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ObjectError, ObjectResult};

/// Reserved payload field holding the kind tag.
pub const TYPE_FIELD: &str = "__type__";

/// Reserved payload field for the entry name; never part of the body.
pub const NAME_FIELD: &str = "name";

/// Tag of the default kind, [`Fields`].
pub const DEFAULT_KIND: &str = "GitBlob";

/// A structured value that can be carried by a blob.
///
/// Implemented for every `Serialize` type; the value must serialize to a
/// JSON object.
pub trait BlobPayload: Any + Send + Sync + fmt::Debug {
    /// The payload as an ordered field map.
    fn to_fields(&self) -> ObjectResult<Map<String, Value>>;

    fn as_any(&self) -> &dyn Any;
}

impl<T> BlobPayload for T
where
    T: Serialize + Any + Send + Sync + fmt::Debug,
{
    fn to_fields(&self) -> ObjectResult<Map<String, Value>> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(ObjectError::Payload(format!(
                "payload must serialize to a JSON object, got {other}"
            ))),
            Err(e) => Err(ObjectError::Payload(e.to_string())),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A payload type with a fixed registry tag.
pub trait BlobKind: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// The tag written to `__type__`.
    const TAG: &'static str;
}

/// The default blob kind: a plain ordered field map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(pub Map<String, Value>);

impl Fields {
    /// Create an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Value of field `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl BlobKind for Fields {
    const TAG: &'static str = DEFAULT_KIND;
}

/// Reconstructs a payload from its decoded fields (tag already removed).
pub type Constructor =
    Arc<dyn Fn(Map<String, Value>) -> ObjectResult<Arc<dyn BlobPayload>> + Send + Sync>;

/// Mapping from kind tag to constructor.
///
/// [`KindRegistry::new`] pre-registers [`Fields`] under [`DEFAULT_KIND`].
#[derive(Clone)]
pub struct KindRegistry {
    constructors: HashMap<String, Constructor>,
}

impl KindRegistry {
    /// A registry holding only the default kind.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_kind::<Fields>();
        registry
    }

    /// A registry with no kinds at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Associate `tag` with a constructor, replacing any previous one.
    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(Map<String, Value>) -> ObjectResult<Arc<dyn BlobPayload>> + Send + Sync + 'static,
    {
        let tag = tag.into();
        if self.constructors.insert(tag.clone(), Arc::new(constructor)).is_some() {
            tracing::debug!(tag = %tag, "replaced blob kind constructor");
        }
    }

    /// Register a serde-backed constructor for `T` under `T::TAG`.
    pub fn register_kind<T: BlobKind>(&mut self) {
        self.register(T::TAG, |fields| {
            let value: T = serde_json::from_value(Value::Object(fields))
                .map_err(|e| ObjectError::Payload(format!("{}: {e}", T::TAG)))?;
            Ok(Arc::new(value) as Arc<dyn BlobPayload>)
        });
    }

    /// Look up the constructor for `tag`.
    pub fn lookup(&self, tag: &str) -> ObjectResult<&Constructor> {
        self.constructors
            .get(tag)
            .ok_or_else(|| ObjectError::UnknownKind(tag.to_string()))
    }

    /// Run the constructor registered for `tag`.
    pub fn construct(
        &self,
        tag: &str,
        fields: Map<String, Value>,
    ) -> ObjectResult<Arc<dyn BlobPayload>> {
        let constructor = self.lookup(tag)?;
        constructor(fields)
    }

    /// Whether a constructor is registered for `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
