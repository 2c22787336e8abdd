use crate::error::ValidationError;

use serde_json::{Map, Value};

use std::fmt::{self, Display};

pub type JsonObject = Map<String, Value>;

pub static API_VERSION_POINTER: &str = "/apiVersion";
pub static KIND_POINTER: &str = "/kind";
pub static NAMESPACE_POINTER: &str = "/metadata/namespace";
pub static NAME_POINTER: &str = "/metadata/name";

/// Metadata fields that are assigned by the api server and must not leak into a body that's
/// going to be compared against, or used to recreate, another resource
pub const SERVER_ASSIGNED_METADATA: &[&str] = &[
    "selfLink",
    "uid",
    "resourceVersion",
    "creationTimestamp",
    "generation",
];

/// Read access to the fields of a resource body that identify it
pub trait ResourceJson {
    fn get_api_version(&self) -> Option<&str>;
    fn get_kind(&self) -> Option<&str>;
    fn get_namespace(&self) -> Option<&str>;
    fn get_name(&self) -> Option<&str>;
}

fn str_value<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

impl ResourceJson for Value {
    fn get_api_version(&self) -> Option<&str> {
        str_value(self, API_VERSION_POINTER)
    }

    fn get_kind(&self) -> Option<&str> {
        str_value(self, KIND_POINTER)
    }

    fn get_namespace(&self) -> Option<&str> {
        str_value(self, NAMESPACE_POINTER)
    }

    fn get_name(&self) -> Option<&str> {
        str_value(self, NAME_POINTER)
    }
}

/// Kind, namespace and name of a resource on the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> ResourceId {
        ResourceId {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Returns the `metadata` object of the body, creating it if it's missing
pub fn metadata_mut(body: &mut Value) -> Result<&mut JsonObject, ValidationError> {
    let object = body.as_object_mut().ok_or(ValidationError::NotAnObject)?;
    let metadata = object
        .entry("metadata")
        .or_insert_with(|| Value::Object(JsonObject::new()));
    if !metadata.is_object() {
        *metadata = Value::Object(JsonObject::new());
    }
    match metadata {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationError::NotAnObject),
    }
}

/// Overwrites `metadata.namespace`, regardless of what the caller put there
pub fn set_namespace(body: &mut Value, namespace: &str) -> Result<(), ValidationError> {
    metadata_mut(body)?.insert("namespace".to_owned(), Value::String(namespace.to_owned()));
    Ok(())
}

/// Overwrites `metadata.name` and `metadata.namespace` with the given identity
pub fn set_identity(body: &mut Value, namespace: &str, name: &str) -> Result<(), ValidationError> {
    let metadata = metadata_mut(body)?;
    metadata.insert("name".to_owned(), Value::String(name.to_owned()));
    metadata.insert("namespace".to_owned(), Value::String(namespace.to_owned()));
    Ok(())
}

/// Removes server assigned identity from a resource body: the `SERVER_ASSIGNED_METADATA`
/// fields, the whole `status`, and the `spec.clusterIP` of services.
pub fn strip_server_fields(body: &mut Value) {
    if let Some(object) = body.as_object_mut() {
        object.remove("status");
        if let Some(Value::Object(metadata)) = object.get_mut("metadata") {
            for field in SERVER_ASSIGNED_METADATA {
                metadata.remove(*field);
            }
        }
        if let Some(Value::Object(spec)) = object.get_mut("spec") {
            spec.remove("clusterIP");
        }
    }
}
