//! An in-memory provider for testing code that uses the resource and parent clients, without a
//! cluster. It behaves like a small api server: it assigns server side fields on create, answers
//! 404 for missing resources and 409 for duplicate creates, merges patches, and records every
//! call so tests can assert on what was (or wasn't) sent.
//!
//! Cluster scoped resources, like projects and users, are stored under an empty namespace.
use crate::error::BoxError;
use crate::operation::{pluralize, Operation};
use crate::provider::{ApiError, ApiResponse, CallError, ClientHandle, ProviderConnection, RawResponse};
use crate::resource::{JsonObject, ResourceJson};

use bytes::Bytes;
use serde_json::Value;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const CREATION_TIMESTAMP: &str = "2026-01-01T00:00:00Z";

/// A call as seen by the provider: the api version it connected with and the operation name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub api_version: String,
    pub operation: String,
}

#[derive(Debug)]
enum Failure {
    Api(ApiError),
    Transport(String),
}

type Key = (String, String, String);

#[derive(Debug, Default)]
struct FakeState {
    resources: BTreeMap<Key, Value>,
    calls: Vec<RecordedCall>,
    discoveries: usize,
    handles_discovered: bool,
    next_failure: Option<Failure>,
    next_discovery_failure: Option<ApiError>,
    next_response: Option<ApiResponse>,
    counter: u64,
}

impl FakeState {
    fn next_counter(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    fn take_failure(&mut self) -> Result<(), CallError> {
        match self.next_failure.take() {
            Some(Failure::Api(err)) => Err(CallError::Api(err)),
            Some(Failure::Transport(message)) => Err(CallError::Transport(message.into())),
            None => Ok(()),
        }
    }

    fn assign_server_fields(&mut self, body: &mut Value, kind: &str, namespace: &str, name: &str) {
        let n = self.next_counter();
        let api_version = body.get_api_version().unwrap_or("v1").to_owned();
        if let Some(object) = body.as_object_mut() {
            object.insert("kind".to_owned(), Value::String(kind.to_owned()));
            object.entry("apiVersion").or_insert_with(|| Value::String(api_version.clone()));
            object.insert("status".to_owned(), Value::Object(JsonObject::new()));

            let metadata = object
                .entry("metadata")
                .or_insert_with(|| Value::Object(JsonObject::new()));
            if let Value::Object(metadata) = metadata {
                let plural = pluralize(&kind.to_lowercase());
                let self_link = if namespace.is_empty() {
                    format!("/api/{}/{}/{}", api_version, plural, name)
                } else {
                    format!("/api/{}/namespaces/{}/{}/{}", api_version, namespace, plural, name)
                };
                metadata.insert("name".to_owned(), Value::String(name.to_owned()));
                if !namespace.is_empty() {
                    metadata.insert("namespace".to_owned(), Value::String(namespace.to_owned()));
                }
                metadata.insert("selfLink".to_owned(), Value::String(self_link));
                metadata.insert("uid".to_owned(), Value::String(format!("00000000-0000-4000-8000-{:012x}", n)));
                metadata.insert("resourceVersion".to_owned(), Value::String(n.to_string()));
                metadata.insert("creationTimestamp".to_owned(), Value::String(CREATION_TIMESTAMP.to_owned()));
                metadata.insert("generation".to_owned(), Value::from(1));
            }

            if kind == "Service" {
                let spec = object
                    .entry("spec")
                    .or_insert_with(|| Value::Object(JsonObject::new()));
                if let Value::Object(spec) = spec {
                    spec.entry("clusterIP")
                        .or_insert_with(|| Value::String(format!("172.30.{}.{}", n / 250, n % 250 + 1)));
                }
            }
        }
    }

    fn bump_version(&mut self, body: &mut Value, increment_generation: bool) {
        let n = self.next_counter();
        if let Some(Value::Object(metadata)) = body.get_mut("metadata") {
            metadata.insert("resourceVersion".to_owned(), Value::String(n.to_string()));
            if increment_generation {
                let generation = metadata.get("generation").and_then(Value::as_i64).unwrap_or(0);
                metadata.insert("generation".to_owned(), Value::from(generation + 1));
            }
        }
    }
}

/// In-memory `ProviderConnection`. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProvider {
    pub fn new() -> FakeProvider {
        FakeProvider::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        lock(&self.state)
    }

    /// Seeds a resource, as if it had been created earlier. Kind, namespace and name are read from
    /// the body. Server side fields are assigned the same way a create would.
    pub fn insert(&self, mut resource: Value) {
        let kind = resource.get_kind().unwrap_or("").to_owned();
        let namespace = resource.get_namespace().unwrap_or("").to_owned();
        let name = resource.get_name().unwrap_or("").to_owned();
        let mut state = self.state();
        state.assign_server_fields(&mut resource, &kind, &namespace, &name);
        state.resources.insert((kind, namespace, name), resource);
    }

    /// Returns the stored resource, without recording a call
    pub fn get(&self, kind: &str, namespace: &str, name: &str) -> Option<Value> {
        let key = (kind.to_owned(), namespace.to_owned(), name.to_owned());
        self.state().resources.get(&key).cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn operation_names(&self) -> Vec<String> {
        self.state().calls.iter().map(|c| c.operation.clone()).collect()
    }

    pub fn discovery_count(&self) -> usize {
        self.state().discoveries
    }

    /// Makes the next call fail with a provider api error
    pub fn fail_next_call(&self, code: u16, message: impl Into<String>) {
        self.state().next_failure = Some(Failure::Api(ApiError::new(code, "InjectedFailure", message)));
    }

    /// Makes the next call fail below the provider api, as if the connection had dropped
    pub fn fail_next_transport(&self, message: impl Into<String>) {
        self.state().next_failure = Some(Failure::Transport(message.into()));
    }

    /// Makes the next discovery fail with a provider api error
    pub fn fail_next_discovery(&self, code: u16, message: impl Into<String>) {
        self.state().next_discovery_failure = Some(ApiError::new(code, "InjectedFailure", message));
    }

    /// Whether newly connected handles are already discovered. Defaults to `false`
    pub fn set_handles_discovered(&self, discovered: bool) {
        self.state().handles_discovered = discovered;
    }

    /// The next call returns this response as is, without touching the stored resources
    pub fn respond_next_with(&self, response: ApiResponse) {
        self.state().next_response = Some(response);
    }
}

impl ProviderConnection for FakeProvider {
    fn connect_client(&self, api_version: &str, operation: &Operation) -> Result<Box<dyn ClientHandle>, BoxError> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            api_version: api_version.to_owned(),
            operation: operation.method_name(),
        });
        Ok(Box::new(FakeHandle {
            state: self.state.clone(),
            discovered: state.handles_discovered,
        }))
    }
}

struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
    discovered: bool,
}

impl FakeHandle {
    /// Injected failures and scripted responses win over the stored resources
    fn respond<F>(&self, f: F) -> Result<ApiResponse, CallError>
    where
        F: FnOnce(&mut FakeState) -> Result<ApiResponse, CallError>,
    {
        let mut state = lock(&self.state);
        state.take_failure()?;
        if let Some(response) = state.next_response.take() {
            return Ok(response);
        }
        f(&mut state)
    }
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key(kind: &str, namespace: &str, name: &str) -> Key {
    (kind.to_owned(), namespace.to_owned(), name.to_owned())
}

fn identity(kind: &str, body: &Value) -> Result<(String, String), CallError> {
    let name = body
        .get_name()
        .ok_or_else(|| ApiError::new(422, "Invalid", format!("{} is invalid: metadata.name: Required value", kind)))?;
    let namespace = body.get_namespace().unwrap_or("");
    Ok((namespace.to_owned(), name.to_owned()))
}

/// Applies a json merge patch to the target
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch) => {
            if !target.is_object() {
                *target = Value::Object(JsonObject::new());
            }
            if let Value::Object(target) = target {
                for (field, value) in patch {
                    if value.is_null() {
                        target.remove(field);
                    } else {
                        merge_patch(target.entry(field.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

impl ClientHandle for FakeHandle {
    fn is_discovered(&self) -> bool {
        self.discovered
    }

    fn discover(&mut self) -> Result<(), CallError> {
        let mut state = lock(&self.state);
        state.discoveries += 1;
        if let Some(err) = state.next_discovery_failure.take() {
            return Err(CallError::Api(err));
        }
        self.discovered = true;
        Ok(())
    }

    fn get(&mut self, kind: &str, name: &str, namespace: &str) -> Result<ApiResponse, CallError> {
        self.respond(|state| {
            let found = state.resources.get(&key(kind, namespace, name)).cloned();
            found
                .map(ApiResponse::Object)
                .ok_or_else(|| ApiError::not_found(kind, name).into())
        })
    }

    fn list(&mut self, kind: &str, namespace: &str) -> Result<ApiResponse, CallError> {
        self.respond(|state| {
            let items = state
                .resources
                .iter()
                .filter(|((k, ns, _), _)| k == kind && ns == namespace)
                .map(|(_, value)| value.clone())
                .collect();
            Ok(ApiResponse::List(items))
        })
    }

    fn create(&mut self, kind: &str, body: &Value) -> Result<ApiResponse, CallError> {
        self.respond(|state| {
            let (namespace, name) = identity(kind, body)?;
            // a project request materializes as the project itself
            let stored_kind = if kind == "ProjectRequest" { "Project" } else { kind };
            let key = key(stored_kind, &namespace, &name);
            if state.resources.contains_key(&key) {
                return Err(ApiError::already_exists(stored_kind, &name).into());
            }
            let mut created = body.clone();
            state.assign_server_fields(&mut created, stored_kind, &namespace, &name);
            state.resources.insert(key, created.clone());
            Ok(ApiResponse::Object(created))
        })
    }

    fn patch(&mut self, kind: &str, name: &str, patch: &Value, namespace: &str) -> Result<ApiResponse, CallError> {
        self.respond(|state| {
            let key = key(kind, namespace, name);
            let mut existing = state
                .resources
                .get(&key)
                .cloned()
                .ok_or_else(|| ApiError::not_found(kind, name))?;
            merge_patch(&mut existing, patch);
            state.bump_version(&mut existing, patch.get("spec").is_some());
            state.resources.insert(key, existing.clone());
            Ok(ApiResponse::Object(existing))
        })
    }

    fn update(&mut self, kind: &str, body: &Value) -> Result<ApiResponse, CallError> {
        self.respond(|state| {
            let (namespace, name) = identity(kind, body)?;
            let key = key(kind, &namespace, &name);
            let existing = state
                .resources
                .get(&key)
                .cloned()
                .ok_or_else(|| ApiError::not_found(kind, &name))?;

            let mut replaced = body.clone();
            if let (Some(Value::Object(old)), Some(Value::Object(new))) =
                (existing.get("metadata"), replaced.get_mut("metadata"))
            {
                for field in &["uid", "selfLink", "creationTimestamp", "generation"] {
                    if let Some(value) = old.get(*field) {
                        new.insert((*field).to_owned(), value.clone());
                    }
                }
            }
            state.bump_version(&mut replaced, true);
            state.resources.insert(key, replaced.clone());
            Ok(ApiResponse::Object(replaced))
        })
    }

    fn delete(&mut self, kind: &str, name: &str, namespace: &str) -> Result<ApiResponse, CallError> {
        self.respond(|state| {
            let removed = state
                .resources
                .remove(&key(kind, namespace, name))
                .ok_or_else(|| ApiError::not_found(kind, name))?;
            let body = serde_json::to_vec(&removed).map_err(|e| CallError::Transport(Box::new(e)))?;
            Ok(ApiResponse::Raw(RawResponse {
                status: 200,
                body: Bytes::from(body),
                description: "OK".to_owned(),
            }))
        })
    }
}
