use crate::dispatch::{Call, CallContext, DEFAULT_API_VERSION};
use crate::error::{Error, ValidationError};
use crate::operation::{Operation, Verb};
use crate::project::Project;
use crate::resource::{self, ResourceJson};

use serde_json::Value;

/// Client for the resources that live inside of a project's namespace. Everything created,
/// patched or replaced through it gets its `metadata.namespace` forced to the project's name.
#[derive(Debug, Clone)]
pub struct ParentClient {
    project: Project,
}

impl ParentClient {
    pub fn new(project: Project) -> ParentClient {
        ParentClient { project }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn name(&self) -> &str {
        self.project.name()
    }

    /// Creates a new resource in this namespace. The kind and api version are taken from the body.
    /// Any failure is an error, including a 404, since there's nothing to be absent here.
    pub fn create_child(&self, mut body: Value) -> Result<Value, Error> {
        let kind = required_kind(&body)?;
        resource::set_namespace(&mut body, self.name())?;
        let api_version = body.get_api_version().unwrap_or(DEFAULT_API_VERSION).to_owned();
        log::info!("Creating {} '{}' in namespace: {}", kind, body.get_name().unwrap_or(""), self.name());

        let operation = Operation::new(Verb::Create, kind.as_str());
        let outcome = self
            .project
            .dispatcher()
            .dispatch(&kind, Call::Create { body: &body }, &api_version)?;
        outcome.into_required(CallContext {
            kind: &kind,
            name: body.get_name(),
            namespace: Some(self.name()),
            operation: &operation,
        })
    }

    /// Gets a single resource by name and kind. The namespace defaults to this project's, but can
    /// be overridden to look into other namespaces through the same connection.
    pub fn fetch_child_by_name(
        &self,
        name: &str,
        kind: &str,
        namespace: Option<&str>,
        api_version: &str,
    ) -> Result<Option<Value>, Error> {
        let namespace = namespace.unwrap_or_else(|| self.name());
        let operation = Operation::new(Verb::Get, kind);
        let outcome = self
            .project
            .dispatcher()
            .dispatch(kind, Call::Get { name, namespace }, api_version)?;
        outcome.into_optional(CallContext {
            kind,
            name: Some(name),
            namespace: Some(namespace),
            operation: &operation,
        })
    }

    /// Lists every resource of the given kind in this namespace, in the order the provider
    /// returned them
    pub fn list_children(&self, kind: &str, api_version: &str) -> Result<Vec<Value>, Error> {
        let operation = Operation::new(Verb::List, kind);
        let outcome = self
            .project
            .dispatcher()
            .dispatch(kind, Call::List { namespace: self.name() }, api_version)?;
        let children = outcome.into_list(CallContext {
            kind,
            name: None,
            namespace: Some(self.name()),
            operation: &operation,
        })?;
        log::debug!("Found {} {} in namespace: {}", children.len(), operation.kind, self.name());
        Ok(children)
    }

    /// Patches an existing resource, located by the name and kind in the body. The api version
    /// is taken from the body.
    pub fn patch_child(&self, mut body: Value) -> Result<Value, Error> {
        let kind = required_kind(&body)?;
        let name = body
            .get_name()
            .map(str::to_owned)
            .ok_or_else(|| ValidationError::MissingField {
                field: "metadata.name",
                kind: Some(kind.clone()),
            })?;
        resource::set_namespace(&mut body, self.name())?;
        let api_version = body.get_api_version().unwrap_or(DEFAULT_API_VERSION).to_owned();

        let operation = Operation::new(Verb::Patch, kind.as_str());
        let call = Call::Patch {
            name: &name,
            body: &body,
            namespace: self.name(),
        };
        let outcome = self.project.dispatcher().dispatch(&kind, call, &api_version)?;
        outcome.into_required(CallContext {
            kind: &kind,
            name: Some(&name),
            namespace: Some(self.name()),
            operation: &operation,
        })
    }

    /// Replaces an existing resource with the given body. Returns `Ok(None)` if it doesn't exist.
    pub fn replace_child(&self, mut body: Value, api_version: &str) -> Result<Option<Value>, Error> {
        let kind = required_kind(&body)?;
        if body.get_name().is_none() {
            return Err(ValidationError::MissingField {
                field: "metadata.name",
                kind: Some(kind),
            }
            .into());
        }
        resource::set_namespace(&mut body, self.name())?;

        let operation = Operation::new(Verb::Update, kind.as_str());
        let outcome = self
            .project
            .dispatcher()
            .dispatch(&kind, Call::Update { body: &body }, api_version)?;
        outcome.into_optional(CallContext {
            kind: &kind,
            name: body.get_name(),
            namespace: Some(self.name()),
            operation: &operation,
        })
    }
}

fn required_kind(body: &Value) -> Result<String, ValidationError> {
    if !body.is_object() {
        return Err(ValidationError::NotAnObject);
    }
    body.get_kind()
        .map(str::to_owned)
        .ok_or(ValidationError::MissingField { field: "kind", kind: None })
}
