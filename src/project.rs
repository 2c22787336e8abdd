use crate::cluster_client::ClusterClient;
use crate::dispatch::Dispatcher;
use crate::provider::ProviderConnection;

use std::fmt::{self, Debug};
use std::sync::Arc;

/// A namespace on the cluster, together with the provider connection that manages it.
/// Both clients are scoped by a project: the resource client uses it for its namespace, and the
/// parent client creates and lists resources inside of it.
#[derive(Clone)]
pub struct Project {
    name: String,
    provider: Arc<dyn ProviderConnection>,
}

impl Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Project").field("name", &self.name).finish()
    }
}

impl Project {
    pub fn new(name: impl Into<String>, provider: Arc<dyn ProviderConnection>) -> Project {
        Project {
            name: name.into(),
            provider,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn provider(&self) -> &dyn ProviderConnection {
        self.provider.as_ref()
    }

    /// Client for the projects and users of the provider that manages this project
    pub fn cluster_client(&self) -> ClusterClient {
        ClusterClient::new(self.provider.clone())
    }

    pub(crate) fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(self.provider.as_ref())
    }
}
