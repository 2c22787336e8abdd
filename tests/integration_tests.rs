use container_sync::prelude::*;
use container_sync::serde_json::{self, json, Value};
use container_sync::testkit::FakeProvider;

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use std::sync::Arc;

const NAMESPACE: &str = "testproject";

fn setup() -> (Arc<FakeProvider>, Project) {
    std::env::set_var("RUST_LOG", "container_sync=trace");
    let _ = env_logger::try_init();

    let provider = Arc::new(FakeProvider::new());
    provider.insert(service("mysql", NAMESPACE));
    provider.insert(service("cakephp-mysql-example", NAMESPACE));
    provider.insert(service("mysql", "otherproject"));
    let project = Project::new(NAMESPACE, provider.clone());
    (provider, project)
}

fn service(name: &str, namespace: &str) -> Value {
    let service = Service {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("mysql".to_owned()),
                protocol: Some("TCP".to_owned()),
                port: 3306,
                target_port: Some(IntOrString::Int(3306)),
                ..Default::default()
            }]),
            selector: Some(vec![("name".to_owned(), name.to_owned())].into_iter().collect()),
            ..Default::default()
        }),
        ..Default::default()
    };
    serde_json::to_value(&service).expect("failed to serialize service")
}

#[test]
fn fetching_a_service_by_its_local_type() {
    let (provider, project) = setup();
    let client = ResourceClient::new("ContainerService", "mysql", Some(project)).expect("failed to create client");
    assert_eq!("Service", client.kind_in_provider());

    let fetched = client
        .fetch(DEFAULT_API_VERSION)
        .expect("fetch failed")
        .expect("service should exist");
    assert_eq!(Some("mysql"), fetched.get_name());
    assert_eq!(Some(NAMESPACE), fetched.get_namespace());
    assert_eq!(Some("Service"), fetched.get_kind());
    assert_eq!(vec!["get_service".to_owned()], provider.operation_names());
}

#[test]
fn deleted_resource_is_absent_afterwards() {
    let (provider, project) = setup();
    let client = ResourceClient::new("ContainerService", "mysql", Some(project)).unwrap();

    let deleted = client.delete(DEFAULT_API_VERSION).expect("delete failed");
    let deleted = deleted.expect("delete should return the deleted resource");
    assert_eq!(Some("mysql"), deleted.get_name());

    assert_eq!(None, client.fetch(DEFAULT_API_VERSION).expect("fetch failed"));
    assert_eq!(None, client.fetch_clean(DEFAULT_API_VERSION).expect("fetch_clean failed"));
    assert!(provider.get("Service", NAMESPACE, "mysql").is_none());
    assert!(provider.get("Service", "otherproject", "mysql").is_some());
}

#[test]
fn replacing_with_another_kind_is_rejected_before_any_call() {
    let (provider, project) = setup();
    let client = ResourceClient::new("ContainerService", "mysql", Some(project)).unwrap();
    let route = json!({
        "apiVersion": "route.openshift.io/v1",
        "kind": "Route",
        "metadata": { "name": "mysql" },
        "spec": { "to": { "kind": "Service", "name": "mysql" } }
    });

    let err = client.replace(route, DEFAULT_API_VERSION).unwrap_err();
    match err {
        Error::Validation(ref validation) => {
            let message = validation.to_string();
            for part in &["Route", "Service", "mysql", NAMESPACE] {
                assert!(message.contains(part), "message '{}' is missing '{}'", message, part);
            }
        }
        ref other => panic!("expected validation error, got: {:?}", other),
    }
    assert!(provider.calls().is_empty());
}

#[test]
fn listing_children_of_a_project() {
    let (provider, project) = setup();
    let parent = ParentClient::new(project);

    let children = parent.list_children("Service", DEFAULT_API_VERSION).expect("list failed");
    assert_eq!(2, children.len());
    let names = children.iter().filter_map(ResourceJson::get_name).collect::<Vec<_>>();
    assert_eq!(vec!["cakephp-mysql-example", "mysql"], names);
    for child in children.iter() {
        assert_eq!(Some(NAMESPACE), child.get_namespace());
    }
    assert_eq!(vec!["get_services".to_owned()], provider.operation_names());
}

#[test]
fn creating_a_child_that_already_exists_fails() {
    let (_, project) = setup();
    let parent = ParentClient::new(project);

    let err = parent.create_child(service("mysql", NAMESPACE)).unwrap_err();
    match err {
        Error::ProviderCall(ref e) => {
            assert_eq!(409, e.status);
            assert_eq!("create_service", e.operation);
            assert_eq!(Some(NAMESPACE.to_owned()), e.namespace);
        }
        ref other => panic!("expected provider call error, got: {:?}", other),
    }
}

#[test]
fn created_child_can_be_fetched_clean_and_recreated() {
    let (provider, project) = setup();
    let parent = ParentClient::new(project.clone());

    let created = parent
        .create_child(service("mysql2", "someotherproject"))
        .expect("create failed");
    assert_eq!(Some(NAMESPACE), created.get_namespace());

    let client = ResourceClient::new("ContainerService", "mysql2", Some(project)).unwrap();
    let clean = client
        .fetch_clean(DEFAULT_API_VERSION)
        .unwrap()
        .expect("created service is missing");
    assert!(clean.pointer("/metadata/uid").is_none());
    assert!(clean.pointer("/spec/clusterIP").is_none());

    client.delete(DEFAULT_API_VERSION).unwrap();
    let recreated = parent.create_child(clean).expect("recreating from the clean copy failed");
    assert_eq!(Some("mysql2"), recreated.get_name());
    assert!(provider.get("Service", NAMESPACE, "mysql2").is_some());
}

#[test]
fn each_call_connects_and_discovers_on_its_own_handle() {
    let (provider, project) = setup();
    let client = ResourceClient::new("ContainerService", "mysql", Some(project)).unwrap();

    client.fetch(DEFAULT_API_VERSION).unwrap();
    client
        .patch(json!({ "metadata": { "labels": { "tier": "db" } } }), DEFAULT_API_VERSION)
        .unwrap();
    client.fetch(DEFAULT_API_VERSION).unwrap();

    assert_eq!(3, provider.calls().len());
    assert_eq!(3, provider.discovery_count());
}

#[test]
fn patch_and_replace_of_a_child_use_their_own_api_versions() {
    let (provider, project) = setup();
    provider.insert(json!({
        "apiVersion": "route.openshift.io/v1",
        "kind": "Route",
        "metadata": { "name": "mysql", "namespace": NAMESPACE },
        "spec": { "to": { "kind": "Service", "name": "mysql" } }
    }));
    let parent = ParentClient::new(project);

    let patch = json!({
        "apiVersion": "route.openshift.io/v1",
        "kind": "Route",
        "metadata": { "name": "mysql" },
        "spec": { "host": "mysql.apps.example.com" }
    });
    let patched = parent.patch_child(patch).expect("patch failed");
    assert_eq!(json!("mysql.apps.example.com"), patched["spec"]["host"]);

    let mut replacement = patched.clone();
    replacement["spec"]["host"] = json!("db.apps.example.com");
    let replaced = parent
        .replace_child(replacement, "route.openshift.io/v1")
        .expect("replace failed")
        .expect("route should exist");
    assert_eq!(json!("db.apps.example.com"), replaced["spec"]["host"]);

    let calls = provider.calls();
    assert_eq!("patch_route", calls[0].operation);
    assert_eq!("route.openshift.io/v1", calls[0].api_version);
    assert_eq!("update_route", calls[1].operation);
    assert_eq!("route.openshift.io/v1", calls[1].api_version);
}

#[test]
fn every_mapped_type_reaches_the_provider_with_its_kind() {
    let (provider, project) = setup();
    for local_type in ContainerResourceType::ALL.iter() {
        let client = ResourceClient::new(local_type.type_name(), "missing", Some(project.clone())).unwrap();
        assert_eq!(None, client.fetch(DEFAULT_API_VERSION).unwrap());
    }
    let names = provider.operation_names();
    assert_eq!(ContainerResourceType::ALL.len(), names.len());
    assert!(names.contains(&"get_replication_controller".to_owned()));
    assert!(names.contains(&"get_build_config".to_owned()));
}

#[test]
fn managing_projects_and_users_of_the_provider() {
    let (provider, project) = setup();
    let cluster = project.cluster_client();

    cluster
        .create_project(json!({ "metadata": { "name": "newproject" }, "displayName": "New Project" }))
        .expect("create project failed");
    assert!(cluster.project_exists("newproject").unwrap());

    let parent = ParentClient::new(Project::new("newproject", provider.clone()));
    parent.create_child(service("mysql", "newproject")).expect("create child failed");
    assert_eq!(1, parent.list_children("Service", DEFAULT_API_VERSION).unwrap().len());

    assert!(cluster.delete_project("newproject").unwrap().is_some());
    assert!(!cluster.project_exists("newproject").unwrap());

    cluster.add_user("developer").expect("add user failed");
    assert!(cluster.user_exists("developer").unwrap());
    assert_eq!(1, cluster.users().unwrap().len());
}
