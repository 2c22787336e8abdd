use super::HttpError;
use crate::config::ClientConfig;
use crate::provider::discovery::{self, ApiResource};
use crate::resource::ResourceJson;

use http::{header, Method, Request};
use hyper::Body;
use serde_json::Value;
use url::Url;

const IMPERSONATE_USER: &str = "Impersonate-User";
const IMPERSONATE_GROUP: &str = "Impersonate-Group";

/// Groups that are served by the api server itself, and so understand strategic merge patches
const STRATEGIC_MERGE_GROUPS: &[&str] = &[
    "",
    "apps",
    "autoscaling",
    "batch",
    "extensions",
    "networking.k8s.io",
    "policy",
    "rbac.authorization.k8s.io",
];

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MergeStrategy {
    JsonMerge,
    StrategicMerge,
}

impl MergeStrategy {
    pub fn for_api_version(api_version: &str) -> MergeStrategy {
        let (group, _) = discovery::split_api_version(api_version);
        if STRATEGIC_MERGE_GROUPS.contains(&group) || group.ends_with(".openshift.io") {
            MergeStrategy::StrategicMerge
        } else {
            MergeStrategy::JsonMerge
        }
    }

    pub fn content_type(&self) -> &'static str {
        match *self {
            MergeStrategy::JsonMerge => "application/merge-patch+json",
            MergeStrategy::StrategicMerge => "application/strategic-merge-patch+json",
        }
    }
}

pub fn discovery_request(config: &ClientConfig, api_version: &str) -> Result<Request<Body>, HttpError> {
    let mut url = base_url(config)?;
    push_segments(&mut url, discovery::path_segments(api_version))?;
    let req = make_req(url, Method::GET, config).body(Body::empty())?;
    Ok(req)
}

pub fn get_request(
    config: &ClientConfig,
    api_version: &str,
    resource: &ApiResource,
    name: &str,
    namespace: &str,
) -> Result<Request<Body>, HttpError> {
    let url = make_url(config, api_version, resource, Some(namespace), Some(name))?;
    let req = make_req(url, Method::GET, config).body(Body::empty())?;
    Ok(req)
}

pub fn list_request(
    config: &ClientConfig,
    api_version: &str,
    resource: &ApiResource,
    namespace: &str,
) -> Result<Request<Body>, HttpError> {
    let url = make_url(config, api_version, resource, Some(namespace), None)?;
    let req = make_req(url, Method::GET, config).body(Body::empty())?;
    Ok(req)
}

pub fn create_request(
    config: &ClientConfig,
    api_version: &str,
    resource: &ApiResource,
    body: &Value,
) -> Result<Request<Body>, HttpError> {
    let url = make_url(config, api_version, resource, body.get_namespace(), None)?;
    let as_vec = serde_json::to_vec(body)?;
    let req = make_req(url, Method::POST, config)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(as_vec))?;
    Ok(req)
}

pub fn patch_request(
    config: &ClientConfig,
    api_version: &str,
    resource: &ApiResource,
    name: &str,
    namespace: &str,
    patch: &Value,
) -> Result<Request<Body>, HttpError> {
    let url = make_url(config, api_version, resource, Some(namespace), Some(name))?;
    let strategy = MergeStrategy::for_api_version(api_version);
    let as_vec = serde_json::to_vec(patch)?;
    let req = make_req(url, Method::PATCH, config)
        .header(header::CONTENT_TYPE, strategy.content_type())
        .body(Body::from(as_vec))?;
    Ok(req)
}

/// Replaces the resource identified by the name and namespace of the body
pub fn replace_request(
    config: &ClientConfig,
    api_version: &str,
    resource: &ApiResource,
    body: &Value,
) -> Result<Request<Body>, HttpError> {
    let name = body.get_name().ok_or(HttpError::MissingName)?;
    let url = make_url(config, api_version, resource, body.get_namespace(), Some(name))?;
    let as_vec = serde_json::to_vec(body)?;
    let req = make_req(url, Method::PUT, config)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(as_vec))?;
    Ok(req)
}

pub fn delete_request(
    config: &ClientConfig,
    api_version: &str,
    resource: &ApiResource,
    name: &str,
    namespace: &str,
) -> Result<Request<Body>, HttpError> {
    let url = make_url(config, api_version, resource, Some(namespace), Some(name))?;
    let req = make_req(url, Method::DELETE, config).body(Body::empty())?;
    Ok(req)
}

fn make_req(url: Url, method: Method, config: &ClientConfig) -> http::request::Builder {
    let mut builder = Request::builder()
        .method(method)
        .uri(url.as_str())
        .header(header::ACCEPT, "application/json")
        .header(header::USER_AGENT, config.user_agent.as_str());
    if let Some(auth) = config.credentials.header_value() {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    if let Some(user) = config.impersonate.as_ref() {
        builder = builder.header(IMPERSONATE_USER, user.as_str());
        for group in config.impersonate_groups.iter() {
            builder = builder.header(IMPERSONATE_GROUP, group.as_str());
        }
    }
    builder
}

fn base_url(config: &ClientConfig) -> Result<Url, HttpError> {
    Url::parse(config.api_server_endpoint.as_str()).map_err(HttpError::Url)
}

fn push_segments<'a>(url: &mut Url, segments: impl IntoIterator<Item = &'a str>) -> Result<(), HttpError> {
    let endpoint = url.to_string();
    let mut path = url
        .path_segments_mut()
        .map_err(|_| HttpError::InvalidEndpoint(endpoint))?;
    path.pop_if_empty();
    path.extend(segments);
    Ok(())
}

/// The namespace is ignored for resources that aren't namespaced
pub fn make_url(
    config: &ClientConfig,
    api_version: &str,
    resource: &ApiResource,
    namespace: Option<&str>,
    name: Option<&str>,
) -> Result<Url, HttpError> {
    let mut url = base_url(config)?;
    let mut segments = discovery::path_segments(api_version);
    if let Some(ns) = namespace.filter(|_| resource.namespaced) {
        segments.push("namespaces");
        segments.push(ns);
    }
    segments.push(resource.name.as_str());
    if let Some(n) = name {
        segments.push(n);
    }
    push_segments(&mut url, segments)?;
    Ok(url)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn config() -> ClientConfig {
        ClientConfig::for_endpoint("container-sync/test", "host.example.com", 8443, "theToken", true)
    }

    fn services() -> ApiResource {
        ApiResource {
            name: "services".to_owned(),
            kind: "Service".to_owned(),
            namespaced: true,
        }
    }

    #[test]
    fn urls_for_core_and_named_groups() {
        let conf = config();
        let url = make_url(&conf, "v1", &services(), Some("testproject"), Some("mysql")).unwrap();
        assert_eq!("https://host.example.com:8443/api/v1/namespaces/testproject/services/mysql", url.as_str());

        let routes = ApiResource {
            name: "routes".to_owned(),
            kind: "Route".to_owned(),
            namespaced: true,
        };
        let url = make_url(&conf, "route.openshift.io/v1", &routes, Some("testproject"), None).unwrap();
        assert_eq!(
            "https://host.example.com:8443/apis/route.openshift.io/v1/namespaces/testproject/routes",
            url.as_str()
        );
    }

    #[test]
    fn cluster_scoped_urls_skip_the_namespace() {
        let nodes = ApiResource {
            name: "nodes".to_owned(),
            kind: "Node".to_owned(),
            namespaced: false,
        };
        let url = make_url(&config(), "v1", &nodes, Some("testproject"), Some("node-1")).unwrap();
        assert_eq!("https://host.example.com:8443/api/v1/nodes/node-1", url.as_str());
    }

    #[test]
    fn endpoint_with_path_prefix() {
        let mut conf = config();
        conf.api_server_endpoint = "https://host.example.com/cluster-1/".to_owned();
        let req = discovery_request(&conf, "apps/v1").unwrap();
        assert_eq!("https://host.example.com/cluster-1/apis/apps/v1", req.uri().to_string());
    }

    #[test]
    fn requests_carry_auth_and_impersonation_headers() {
        let conf = config().impersonate("system:admin", vec!["system:masters".to_owned(), "admins".to_owned()]);
        let req = get_request(&conf, "v1", &services(), "mysql", "testproject").unwrap();
        let headers = req.headers();
        assert_eq!("Bearer theToken", headers[header::AUTHORIZATION]);
        assert_eq!("container-sync/test", headers[header::USER_AGENT]);
        assert_eq!("system:admin", headers[IMPERSONATE_USER]);
        assert_eq!(2, headers.get_all(IMPERSONATE_GROUP).iter().count());
    }

    #[test]
    fn patch_content_type_depends_on_the_group() {
        let patch = json!({ "metadata": { "labels": { "tier": "db" } } });
        let req = patch_request(&config(), "v1", &services(), "mysql", "testproject", &patch).unwrap();
        assert_eq!(Method::PATCH, req.method());
        assert_eq!("application/strategic-merge-patch+json", req.headers()[header::CONTENT_TYPE]);

        assert_eq!(MergeStrategy::StrategicMerge, MergeStrategy::for_api_version("build.openshift.io/v1"));
        assert_eq!(MergeStrategy::JsonMerge, MergeStrategy::for_api_version("example.com/v1alpha1"));
    }

    #[test]
    fn replace_uses_the_identity_of_the_body() {
        let body = json!({ "kind": "Service", "metadata": { "name": "mysql", "namespace": "testproject" } });
        let req = replace_request(&config(), "v1", &services(), &body).unwrap();
        assert_eq!(Method::PUT, req.method());
        assert_eq!(
            "https://host.example.com:8443/api/v1/namespaces/testproject/services/mysql",
            req.uri().to_string()
        );

        let nameless = json!({ "kind": "Service", "metadata": {} });
        assert!(replace_request(&config(), "v1", &services(), &nameless).is_err());
    }
}
