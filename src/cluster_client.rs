//! Provider level operations on the cluster scoped resources that a management system tracks
//! alongside its projects: the projects themselves, and the users that can log into them.
//!
//! Projects are created through a `ProjectRequest`, which the api server turns into a `Project`
//! (and its namespace) on behalf of the caller. Everything else addresses the `Project` and `User`
//! kinds directly.
use crate::dispatch::{Call, CallContext, CallOutcome, Dispatcher};
use crate::error::{Error, ValidationError};
use crate::operation::{Operation, Verb};
use crate::provider::ProviderConnection;
use crate::resource::{self, ResourceJson};

use serde_json::{json, Value};

use std::fmt::{self, Debug};
use std::sync::Arc;

pub const PROJECT_API_VERSION: &str = "project.openshift.io/v1";
pub const USER_API_VERSION: &str = "user.openshift.io/v1";

const PROJECT: &str = "Project";
const PROJECT_REQUEST: &str = "ProjectRequest";
const USER: &str = "User";

/// Cluster scoped calls are sent without a namespace
const NO_NAMESPACE: &str = "";

/// Client for the projects and users of a single provider
#[derive(Clone)]
pub struct ClusterClient {
    provider: Arc<dyn ProviderConnection>,
}

impl Debug for ClusterClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ClusterClient")
    }
}

impl ClusterClient {
    pub fn new(provider: Arc<dyn ProviderConnection>) -> ClusterClient {
        ClusterClient { provider }
    }

    /// Requests a new project. Only `metadata.name` is required. The kind and api version are
    /// filled in, and any `metadata.namespace` is dropped. Top level `displayName` and
    /// `description` are passed along as given.
    pub fn create_project(&self, mut request: Value) -> Result<Value, Error> {
        let name = required_name(&request, PROJECT_REQUEST)?;
        set_type(&mut request, PROJECT_REQUEST, PROJECT_API_VERSION)?;
        resource::metadata_mut(&mut request)?.remove("namespace");
        log::info!("Creating project: {}", name);

        let operation = Operation::new(Verb::Create, PROJECT_REQUEST);
        let outcome = self.dispatch(PROJECT_REQUEST, Call::Create { body: &request }, PROJECT_API_VERSION)?;
        outcome.into_required(context(PROJECT_REQUEST, Some(name.as_str()), &operation))
    }

    /// Deletes a project, and with it everything inside of its namespace. Deleting a project that
    /// doesn't exist returns `Ok(None)`.
    pub fn delete_project(&self, name: &str) -> Result<Option<Value>, Error> {
        log::info!("Deleting project: {}", name);
        let call = Call::Delete {
            name,
            namespace: NO_NAMESPACE,
        };
        let outcome = self.dispatch(PROJECT, call, PROJECT_API_VERSION)?;
        outcome.into_optional(context(PROJECT, Some(name), &Operation::new(Verb::Delete, PROJECT)))
    }

    /// Every project visible to the connected user
    pub fn projects(&self) -> Result<Vec<Value>, Error> {
        self.list(PROJECT, PROJECT_API_VERSION)
    }

    pub fn project_exists(&self, name: &str) -> Result<bool, Error> {
        self.exists(PROJECT, name, PROJECT_API_VERSION)
    }

    pub fn users(&self) -> Result<Vec<Value>, Error> {
        self.list(USER, USER_API_VERSION)
    }

    pub fn user_exists(&self, name: &str) -> Result<bool, Error> {
        self.exists(USER, name, USER_API_VERSION)
    }

    /// Creates a user with the given name. Identities and group membership are left to the
    /// cluster's identity providers.
    pub fn add_user(&self, name: &str) -> Result<Value, Error> {
        log::info!("Adding user: {}", name);
        let body = json!({
            "apiVersion": USER_API_VERSION,
            "kind": USER,
            "metadata": { "name": name },
        });
        let outcome = self.dispatch(USER, Call::Create { body: &body }, USER_API_VERSION)?;
        outcome.into_required(context(USER, Some(name), &Operation::new(Verb::Create, USER)))
    }

    fn list(&self, kind: &str, api_version: &str) -> Result<Vec<Value>, Error> {
        let outcome = self.dispatch(kind, Call::List { namespace: NO_NAMESPACE }, api_version)?;
        let items = outcome.into_list(context(kind, None, &Operation::new(Verb::List, kind)))?;
        log::debug!("Found {} {} in provider", items.len(), kind);
        Ok(items)
    }

    fn exists(&self, kind: &str, name: &str, api_version: &str) -> Result<bool, Error> {
        let call = Call::Get {
            name,
            namespace: NO_NAMESPACE,
        };
        let outcome = self.dispatch(kind, call, api_version)?;
        let found = outcome.into_optional(context(kind, Some(name), &Operation::new(Verb::Get, kind)))?;
        Ok(found.is_some())
    }

    fn dispatch(&self, kind: &str, call: Call<'_>, api_version: &str) -> Result<CallOutcome, Error> {
        Dispatcher::new(self.provider.as_ref()).dispatch(kind, call, api_version)
    }
}

fn context<'a>(kind: &'a str, name: Option<&'a str>, operation: &'a Operation) -> CallContext<'a> {
    CallContext {
        kind,
        name,
        namespace: None,
        operation,
    }
}

fn required_name(body: &Value, kind: &str) -> Result<String, ValidationError> {
    body.get_name()
        .map(str::to_owned)
        .ok_or_else(|| ValidationError::MissingField {
            field: "metadata.name",
            kind: Some(kind.to_owned()),
        })
}

fn set_type(body: &mut Value, kind: &str, api_version: &str) -> Result<(), ValidationError> {
    let object = body.as_object_mut().ok_or(ValidationError::NotAnObject)?;
    object.insert("kind".to_owned(), Value::String(kind.to_owned()));
    object
        .entry("apiVersion")
        .or_insert_with(|| Value::String(api_version.to_owned()));
    Ok(())
}
