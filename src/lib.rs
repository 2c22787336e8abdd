//! container-sync fetches, creates, patches, replaces and deletes the container resources that a
//! management system tracks locally (services, routes, builds, templates and so on) on the
//! Kubernetes or OpenShift cluster they came from.
//!
//! There are two clients:
//!
//! - `ResourceClient` is for a single resource that already exists locally. It knows its own type,
//! name and project, and every operation returns `Ok(None)` when the resource doesn't exist on the
//! cluster.
//! - `ParentClient` is for a project, and works with the resources inside of its namespace.
//! - `ClusterClient` is for the provider itself, and creates, deletes and lists its projects
//! and users.
//!
//! All of them send every call through a `ProviderConnection`. The `HttpProvider`
//! talks to a real api server. With the `testkit` feature, `testkit::FakeProvider` is an in-memory
//! replacement.
//!
//! ```no_run
//! use container_sync::prelude::*;
//! use container_sync::serde_json::json;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::for_endpoint("container-sync", "openshift.example.com", 8443, "theToken", true);
//!     let provider = Arc::new(HttpProvider::new(config)?);
//!     let project = Project::new("testproject", provider);
//!
//!     let service = ResourceClient::new("ContainerService", "mysql", Some(project.clone()))?;
//!     if let Some(current) = service.fetch_clean(DEFAULT_API_VERSION)? {
//!         println!("mysql currently looks like: {}", current);
//!     }
//!
//!     let parent = ParentClient::new(project);
//!     parent.create_child(json!({
//!         "apiVersion": "v1",
//!         "kind": "Service",
//!         "metadata": { "name": "mysql2" },
//!         "spec": { "ports": [{ "port": 3306, "targetPort": 3306 }] }
//!     }))?;
//!     for child in parent.list_children("Service", DEFAULT_API_VERSION)? {
//!         println!("{}", child["metadata"]["name"]);
//!     }
//!     Ok(())
//! }
//! ```

#[macro_use]
extern crate serde_derive;

pub mod cluster_client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod kind_map;
pub mod operation;
pub mod parent_client;
pub mod project;
pub mod provider;
pub mod resource;
pub mod resource_client;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use serde_json;

pub mod prelude {
    pub use crate::cluster_client::ClusterClient;
    pub use crate::config::ClientConfig;
    pub use crate::dispatch::DEFAULT_API_VERSION;
    pub use crate::error::Error;
    pub use crate::kind_map::ContainerResourceType;
    pub use crate::parent_client::ParentClient;
    pub use crate::project::Project;
    pub use crate::provider::rest::HttpProvider;
    pub use crate::provider::ProviderConnection;
    pub use crate::resource::ResourceJson;
    pub use crate::resource_client::ResourceClient;
}
