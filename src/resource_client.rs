use crate::dispatch::{Call, CallContext};
use crate::error::{ConfigurationError, Error, ValidationError};
use crate::kind_map::kind_in_provider;
use crate::operation::Operation;
use crate::project::Project;
use crate::resource::{self, ResourceId, ResourceJson};

use serde_json::Value;

/// Client for a single resource that already exists locally, and so knows its own kind, name,
/// and the project it lives in.
///
/// Every remote operation is one synchronous call. A resource that doesn't exist on the cluster
/// is reported as `Ok(None)`, never as an error.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    local_type: String,
    kind: &'static str,
    name: String,
    project: Option<Project>,
}

impl ResourceClient {
    /// Creates a client for the resource with the given local type name, for example
    /// `"ContainerService"`. Returns a `ConfigurationError` if the type has no provider kind.
    pub fn new(local_type: &str, name: impl Into<String>, project: Option<Project>) -> Result<ResourceClient, Error> {
        let kind = kind_in_provider(local_type)
            .ok_or_else(|| ConfigurationError::UnmappedType(local_type.to_owned()))?;
        Ok(ResourceClient {
            local_type: local_type.to_owned(),
            kind,
            name: name.into(),
            project,
        })
    }

    pub fn local_type(&self) -> &str {
        self.local_type.as_str()
    }

    pub fn kind_in_provider(&self) -> &str {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Name of the owning project, or `None` if the resource isn't currently attached to one
    pub fn namespace(&self) -> Option<&str> {
        self.project.as_ref().map(Project::name)
    }

    /// Retrieves the resource as it currently exists in the provider
    pub fn fetch(&self, api_version: &str) -> Result<Option<Value>, Error> {
        let project = self.project()?;
        let call = Call::Get {
            name: self.name(),
            namespace: project.name(),
        };
        self.send(project, call, api_version)
    }

    /// Same as `fetch`, but with the server assigned fields removed, so the result can be compared
    /// against, or used to recreate, another resource
    pub fn fetch_clean(&self, api_version: &str) -> Result<Option<Value>, Error> {
        let fetched = self.fetch(api_version)?;
        Ok(fetched.map(|mut body| {
            resource::strip_server_fields(&mut body);
            body
        }))
    }

    /// Replaces the whole resource. The payload's `kind` must match this resource's kind, and its
    /// name and namespace are overwritten with this resource's own.
    pub fn replace(&self, mut new_body: Value, api_version: &str) -> Result<Option<Value>, Error> {
        let project = self.project()?;
        if new_body.get_kind() != Some(self.kind) {
            return Err(ValidationError::KindMismatch {
                expected: self.kind.to_owned(),
                actual: new_body.get_kind().map(str::to_owned),
                id: ResourceId::new(self.kind, project.name(), self.name()),
            }
            .into());
        }
        resource::set_identity(&mut new_body, project.name(), self.name())?;
        self.send(project, Call::Update { body: &new_body }, api_version)
    }

    /// Applies a partial update to the resource
    pub fn patch(&self, mut data_to_patch: Value, api_version: &str) -> Result<Option<Value>, Error> {
        let project = self.project()?;
        resource::set_identity(&mut data_to_patch, project.name(), self.name())?;
        let call = Call::Patch {
            name: self.name(),
            body: &data_to_patch,
            namespace: project.name(),
        };
        self.send(project, call, api_version)
    }

    /// Deletes the resource. Deleting a resource that's already gone returns `Ok(None)`
    pub fn delete(&self, api_version: &str) -> Result<Option<Value>, Error> {
        let project = self.project()?;
        log::info!("Deleting {} '{}/{}' from provider", self.kind, project.name(), self.name);
        let call = Call::Delete {
            name: self.name(),
            namespace: project.name(),
        };
        self.send(project, call, api_version)
    }

    fn project(&self) -> Result<&Project, Error> {
        self.project.as_ref().ok_or_else(|| {
            ConfigurationError::MissingProject {
                kind: self.kind.to_owned(),
                name: self.name.clone(),
            }
            .into()
        })
    }

    fn send(&self, project: &Project, call: Call<'_>, api_version: &str) -> Result<Option<Value>, Error> {
        let operation = Operation::new(call.verb(), self.kind);
        let outcome = project.dispatcher().dispatch(self.kind, call, api_version)?;
        outcome.into_optional(CallContext {
            kind: self.kind,
            name: Some(self.name()),
            namespace: Some(project.name()),
            operation: &operation,
        })
    }
}
