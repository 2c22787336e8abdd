//! Api discovery: which resources an api version serves, and whether they're namespaced.
use std::collections::HashMap;

/// Splits an apiVersion into its group and version. The core group is the empty string.
///
/// ```
/// use container_sync::provider::discovery::split_api_version;
///
/// assert_eq!(("", "v1"), split_api_version("v1"));
/// assert_eq!(("route.openshift.io", "v1"), split_api_version("route.openshift.io/v1"));
/// ```
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rfind('/') {
        Some(idx) => (&api_version[..idx], &api_version[(idx + 1)..]),
        None => ("", api_version),
    }
}

/// The path segments that every url for the given api version starts with
pub fn path_segments(api_version: &str) -> Vec<&str> {
    let (group, version) = split_api_version(api_version);
    if group.is_empty() {
        vec!["api", version]
    } else {
        vec!["apis", group, version]
    }
}

/// Path of the discovery document, `/api/v1` for the core group and `/apis/<group>/<version>` otherwise
pub fn discovery_path(api_version: &str) -> String {
    let mut path = String::new();
    for segment in path_segments(api_version) {
        path.push('/');
        path.push_str(segment);
    }
    path
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ApiResource {
    /// The plural name used in urls, for example `services`
    pub name: String,
    pub kind: String,
    pub namespaced: bool,
}

impl ApiResource {
    pub fn is_subresource(&self) -> bool {
        self.name.contains('/')
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

/// Discovered resources of one api version, by kind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscoveredResources {
    api_version: String,
    by_kind: HashMap<String, ApiResource>,
}

impl DiscoveredResources {
    pub fn new(list: ApiResourceList) -> DiscoveredResources {
        let mut by_kind = HashMap::with_capacity(list.resources.len());
        for resource in list.resources.into_iter().filter(|r| !r.is_subresource()) {
            by_kind.entry(resource.kind.clone()).or_insert(resource);
        }
        DiscoveredResources {
            api_version: list.group_version,
            by_kind,
        }
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_str()
    }

    pub fn get(&self, kind: &str) -> Option<&ApiResource> {
        self.by_kind.get(kind)
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}
