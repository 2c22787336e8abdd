//! The boundary between this crate and whatever actually talks to the cluster.
//!
//! A `ProviderConnection` hands out `ClientHandle`s that are scoped to an api version. Each handle
//! has one method per verb, and every method returns one of the three shapes a provider can answer
//! with, or a `CallError`. The `dispatch` module is the only consumer of these traits.
pub mod discovery;
pub mod rest;
pub mod metrics;

use crate::error::BoxError;
use crate::operation::Operation;

use bytes::Bytes;
use serde_json::Value;

use std::fmt::{self, Display};

/// Source of connected client handles. This is the one capability the crate needs from the
/// management system that owns a project.
pub trait ProviderConnection: Send + Sync {
    /// Returns a handle that is able to perform the given operation against the given api version.
    /// Failing to connect is a transport failure, not a provider error.
    fn connect_client(&self, api_version: &str, operation: &Operation) -> Result<Box<dyn ClientHandle>, BoxError>;
}

/// A connection to one api version of the provider. Handles may need to ask the server for its
/// capabilities before the first call, which is what `discover` does.
pub trait ClientHandle {
    fn is_discovered(&self) -> bool;

    fn discover(&mut self) -> Result<(), CallError>;

    fn get(&mut self, kind: &str, name: &str, namespace: &str) -> Result<ApiResponse, CallError>;

    fn list(&mut self, kind: &str, namespace: &str) -> Result<ApiResponse, CallError>;

    fn create(&mut self, kind: &str, body: &Value) -> Result<ApiResponse, CallError>;

    fn patch(&mut self, kind: &str, name: &str, patch: &Value, namespace: &str) -> Result<ApiResponse, CallError>;

    fn update(&mut self, kind: &str, body: &Value) -> Result<ApiResponse, CallError>;

    fn delete(&mut self, kind: &str, name: &str, namespace: &str) -> Result<ApiResponse, CallError>;
}

/// The shapes a successful provider call can produce
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// A list of entities, as returned when listing a kind
    List(Vec<Value>),
    /// The response of the transport, passed through as is
    Raw(RawResponse),
    /// A single structured entity
    Object(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
    pub description: String,
}

/// Failure of a provider call. Only the `Api` variant is a provider-level error that gets
/// translated into a status code. Everything else propagates untouched.
#[derive(Debug)]
pub enum CallError {
    Api(ApiError),
    Transport(BoxError),
}

impl Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CallError::Api(ref e) => e.fmt(f),
            CallError::Transport(ref e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Api(e) => Some(e as &(dyn std::error::Error + 'static)),
            CallError::Transport(e) => Some(e.as_ref() as &(dyn std::error::Error + 'static)),
        }
    }
}

impl From<ApiError> for CallError {
    fn from(e: ApiError) -> CallError {
        CallError::Api(e)
    }
}

/// An error reported by the provider api, typically decoded from a Kubernetes `Status` object
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
pub struct ApiError {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
    pub code: u16,
}

impl ApiError {
    pub fn new(code: u16, reason: impl Into<String>, message: impl Into<String>) -> ApiError {
        ApiError {
            status: "Failure".to_owned(),
            message: message.into(),
            reason: reason.into(),
            code,
        }
    }

    pub fn not_found(kind: &str, name: &str) -> ApiError {
        ApiError::new(404, "NotFound", format!("{} \"{}\" not found", kind, name))
    }

    pub fn already_exists(kind: &str, name: &str) -> ApiError {
        ApiError::new(409, "AlreadyExists", format!("{} \"{}\" already exists", kind, name))
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Api Error: status: '{}', code: {}, reason: '{}', message: '{}'",
            self.status, self.code, self.reason, self.message
        )
    }
}
impl std::error::Error for ApiError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn api_error_decodes_from_status_object() {
        let status = serde_json::json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": "services \"mysql\" already exists",
            "reason": "AlreadyExists",
            "details": { "name": "mysql", "kind": "services" },
            "code": 409
        });
        let err: ApiError = serde_json::from_value(status).expect("failed to decode status");
        assert_eq!(409, err.code);
        assert_eq!("AlreadyExists", err.reason);
        assert_eq!("services \"mysql\" already exists", err.message);
    }
}
