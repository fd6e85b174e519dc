//! The generic resource envelope that is exchanged with the cluster api, and the uniform
//! response type that every operation returns.
//!
//! A `ResourceEnvelope` has a fixed header (`kind`, `apiVersion`, `metadata`) and an open body
//! holding every other top-level field (`spec`, `data`, `items`, `subjects`, ...). The client
//! only looks inside the body where a specific kind needs it, so any resource kind can be passed
//! through without modelling its schema.
pub mod factory;
pub mod immutability;
pub mod json_ext;
pub mod subject;

pub use self::factory::ResourceFactory;
pub use self::immutability::ImmutabilityPreserver;
pub use self::json_ext::ResourceJson;
pub use self::subject::{Subject, SubjectKind};

use crate::error::InvalidResourceError;

use serde_json::Value;

use std::fmt::{self, Display};

pub type JsonObject = serde_json::Map<String, Value>;

pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const LIST_KIND: &str = "List";

pub const UID_KEY: &str = "uid";
pub const RESOURCE_VERSION_KEY: &str = "resourceVersion";

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    pub kind: String,
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub metadata: JsonObject,
    #[serde(flatten)]
    pub body: JsonObject,
}

impl ResourceEnvelope {
    /// Creates an empty envelope of the given kind with the default `v1` apiVersion
    pub fn new(kind: impl Into<String>) -> ResourceEnvelope {
        ResourceEnvelope::with_api_version(kind, DEFAULT_API_VERSION)
    }

    pub fn with_api_version(
        kind: impl Into<String>,
        api_version: impl Into<String>,
    ) -> ResourceEnvelope {
        ResourceEnvelope {
            kind: kind.into(),
            api_version: api_version.into(),
            metadata: JsonObject::new(),
            body: JsonObject::new(),
        }
    }

    /// A skeleton that has just enough in it to resolve a url for the named resource
    pub fn named(
        kind: impl Into<String>,
        api_version: impl Into<String>,
        name: impl Into<String>,
    ) -> ResourceEnvelope {
        let mut resource = ResourceEnvelope::with_api_version(kind, api_version);
        resource.set_name(name);
        resource
    }

    pub fn from_value(value: Value) -> Result<ResourceEnvelope, InvalidResourceError> {
        if value.get_kind().is_none() {
            return Err(InvalidResourceError::new("missing kind", value));
        }
        if !value.get("metadata").map(Value::is_object).unwrap_or(true) {
            return Err(InvalidResourceError::new("metadata is not an object", value));
        }
        serde_json::from_value(value.clone())
            .map_err(|_| InvalidResourceError::new("not a resource envelope", value))
    }

    pub fn to_value(&self) -> Value {
        // a struct of strings and json maps always serializes
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn is_list(&self) -> bool {
        self.kind == LIST_KIND
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.meta_str("name")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta_str("namespace")
    }

    pub fn uid(&self) -> Option<&str> {
        self.meta_str(UID_KEY)
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.meta_str(RESOURCE_VERSION_KEY)
    }

    /// Returns the name, or an error if this resource can't be used for a named operation
    pub fn require_name(&self) -> Result<&str, InvalidResourceError> {
        match self.name() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(InvalidResourceError::new(
                "missing metadata.name",
                self.to_value(),
            )),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata
            .insert("name".to_owned(), Value::String(name.into()));
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.metadata
            .insert("namespace".to_owned(), Value::String(namespace.into()));
    }

    /// Removes `metadata.uid` and `metadata.resourceVersion`, which are assigned by the server
    /// and must not be sent when creating a resource.
    pub fn strip_server_identity(&mut self) {
        self.metadata.remove(UID_KEY);
        self.metadata.remove(RESOURCE_VERSION_KEY);
    }

    /// Returns the `metadata.annotations` object, creating it if needed
    pub fn annotations_mut(&mut self) -> &mut JsonObject {
        let annotations = self
            .metadata
            .entry("annotations")
            .or_insert_with(|| Value::Object(JsonObject::new()));
        if !annotations.is_object() {
            *annotations = Value::Object(JsonObject::new());
        }
        match annotations {
            Value::Object(map) => map,
            _ => unreachable!("annotations was just set to an object"),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: Value) {
        self.body.insert(key.into(), value);
    }

    /// The member resources of a `List`. Every item must be a resource envelope, otherwise
    /// none of them are returned.
    pub fn items(&self) -> Result<Vec<ResourceEnvelope>, InvalidResourceError> {
        match self.body.get("items") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| ResourceEnvelope::from_value(item.clone()))
                .collect(),
            Some(other) => Err(InvalidResourceError::new(
                "items is not an array",
                other.clone(),
            )),
        }
    }
}

impl Display for ResourceEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{} '{}'",
            self.api_version,
            self.kind,
            self.name().unwrap_or("")
        )
    }
}

impl From<ResourceEnvelope> for Value {
    fn from(resource: ResourceEnvelope) -> Value {
        resource.to_value()
    }
}

/// The result of every operation: the http status code and whatever body came back. Non-2xx
/// statuses are returned here rather than as errors.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub data: Value,
}

impl ApiResponse {
    pub fn new(status: u16, data: Value) -> ApiResponse {
        ApiResponse { status, data }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    /// Parses `data` as a resource envelope, if it is one
    pub fn resource(&self) -> Option<ResourceEnvelope> {
        ResourceEnvelope::from_value(self.data.clone()).ok()
    }

    /// The `items` of a list response, or an empty slice if there are none
    pub fn items(&self) -> &[Value] {
        self.data
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Display for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "status: {}, data: {}", self.status, self.data)
    }
}
