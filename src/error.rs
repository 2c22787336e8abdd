//! Errors returned by the resource and parent clients.
//!
//! A resource that doesn't exist on the cluster is never an error. Operations that can legitimately
//! find nothing return `Ok(None)`, and callers are expected to check for that explicitly.
use crate::resource::ResourceId;

use std::fmt::{self, Display};

/// Boxed error used for failures below the provider api, like connection or TLS problems.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug)]
pub enum Error {
    /// The provider answered with a status other than success or a tolerated 404
    ProviderCall(ProviderCallError),
    /// A local precondition failed before anything was sent
    Validation(ValidationError),
    /// The resource can't be addressed with the current setup
    Configuration(ConfigurationError),
    /// Failure in the transport underneath the provider api. These are never classified
    Transport(BoxError),
    /// A raw provider response had a payload that wasn't valid json
    Decode(serde_json::Error),
}

impl Error {
    /// Returns the status code of a failed provider call, if that's what this error is
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ProviderCall(e) => Some(e.status),
            _ => None,
        }
    }

    pub fn is_provider_call(&self) -> bool {
        matches!(self, Error::ProviderCall(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ProviderCall(ref e) => e.fmt(f),
            Error::Validation(ref e) => e.fmt(f),
            Error::Configuration(ref e) => e.fmt(f),
            Error::Transport(ref e) => write!(f, "Transport error: {}", e),
            Error::Decode(ref e) => write!(f, "Invalid response payload: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProviderCall(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::Validation(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::Configuration(e) => Some(e as &(dyn std::error::Error + 'static)),
            Error::Transport(e) => Some(e.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Decode(e) => Some(e as &(dyn std::error::Error + 'static)),
        }
    }
}

impl From<ProviderCallError> for Error {
    fn from(e: ProviderCallError) -> Error {
        Error::ProviderCall(e)
    }
}
impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Error {
        Error::Validation(e)
    }
}
impl From<ConfigurationError> for Error {
    fn from(e: ConfigurationError) -> Error {
        Error::Configuration(e)
    }
}
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Decode(e)
    }
}

/// A remote call that completed with a non-success status, or that raised a provider api error.
/// Carries everything needed to diagnose the failure without going back to the logs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCallError {
    pub kind: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub operation: String,
    pub status: u16,
    pub message: String,
}

impl Display for ProviderCallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Unexpected error from provider while calling '{}' for kind {}", self.operation, self.kind)?;
        if let Some(name) = self.name.as_ref() {
            write!(f, ", resource name {}", name)?;
        }
        if let Some(namespace) = self.namespace.as_ref() {
            write!(f, ", namespace {}", namespace)?;
        }
        write!(f, ", HTTP response code {}, and message: {}", self.status, self.message)
    }
}
impl std::error::Error for ProviderCallError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The payload of a whole-object replace names a different kind than the target
    KindMismatch {
        expected: String,
        actual: Option<String>,
        id: ResourceId,
    },
    /// A field that's needed to address the resource is missing from the payload
    MissingField {
        field: &'static str,
        kind: Option<String>,
    },
    /// The payload is not a json object
    NotAnObject,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ValidationError::KindMismatch { ref expected, ref actual, ref id } => write!(
                f,
                "Cannot replace {}/{}: payload kind '{}' does not match the resource kind '{}'",
                id.namespace,
                id.name,
                actual.as_deref().unwrap_or("<none>"),
                expected
            ),
            ValidationError::MissingField { field, ref kind } => match kind {
                Some(kind) => write!(f, "Payload for kind {} is missing required field '{}'", kind, field),
                None => write!(f, "Payload is missing required field '{}'", field),
            },
            ValidationError::NotAnObject => f.write_str("Payload must be a json object"),
        }
    }
}
impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// No provider kind is known for this local resource type
    UnmappedType(String),
    /// The resource has no owning project, so there's no namespace or provider to talk to
    MissingProject { kind: String, name: String },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigurationError::UnmappedType(ref local_type) => write!(
                f,
                "No provider kind is mapped for resource type '{}'",
                local_type
            ),
            ConfigurationError::MissingProject { ref kind, ref name } => write!(
                f,
                "{} '{}' does not belong to a project",
                kind, name
            ),
        }
    }
}
impl std::error::Error for ConfigurationError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_mismatch_message_names_both_kinds_and_the_target() {
        let err = ValidationError::KindMismatch {
            expected: "Service".to_owned(),
            actual: Some("Route".to_owned()),
            id: ResourceId::new("Service", "testproject", "mysql"),
        };
        let message = err.to_string();
        for part in &["Route", "Service", "testproject", "mysql"] {
            assert!(message.contains(part), "message '{}' is missing '{}'", message, part);
        }
    }

    #[test]
    fn provider_call_error_exposes_status() {
        let err: Error = ProviderCallError {
            kind: "Service".to_owned(),
            name: Some("mysql".to_owned()),
            namespace: Some("testproject".to_owned()),
            operation: "create_service".to_owned(),
            status: 409,
            message: "already exists".to_owned(),
        }
        .into();
        assert_eq!(Some(409), err.status());
        assert!(err.is_provider_call());
        assert!(err.to_string().contains("create_service"));
    }
}
