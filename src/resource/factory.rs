//! Builders for the resource kinds that get created during project provisioning.
use crate::resource::{JsonObject, ResourceEnvelope, Subject, DEFAULT_API_VERSION, LIST_KIND};

use serde_json::{json, Value};

use std::collections::BTreeMap;

pub const DISPLAY_NAME_ANNOTATION: &str = "openshift.io/display-name";
pub const DESCRIPTION_ANNOTATION: &str = "openshift.io/description";

pub struct ResourceFactory;

impl ResourceFactory {
    /// An envelope with only `kind` and the default apiVersion set
    pub fn base_resource(kind: &str) -> ResourceEnvelope {
        ResourceEnvelope::new(kind)
    }

    pub fn base_resource_with_version(kind: &str, api_version: &str) -> ResourceEnvelope {
        ResourceEnvelope::with_api_version(kind, api_version)
    }

    /// An empty `List`. Add members with `add_to_list`.
    pub fn list() -> ResourceEnvelope {
        let mut list = ResourceEnvelope::new(LIST_KIND);
        list.set_field("items", Value::Array(Vec::new()));
        list
    }

    pub fn list_of(items: impl IntoIterator<Item = ResourceEnvelope>) -> ResourceEnvelope {
        let mut list = ResourceFactory::list();
        for item in items {
            ResourceFactory::add_to_list(&mut list, item);
        }
        list
    }

    pub fn add_to_list(list: &mut ResourceEnvelope, item: ResourceEnvelope) {
        let items = list
            .body
            .entry("items")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !items.is_array() {
            *items = Value::Array(Vec::new());
        }
        if let Value::Array(items) = items {
            items.push(item.to_value());
        }
    }

    pub fn project(name: &str, display_name: &str, description: &str) -> ResourceEnvelope {
        let mut project = ResourceEnvelope::new("Project");
        project.set_name(name);
        let annotations = project.annotations_mut();
        annotations.insert(DISPLAY_NAME_ANNOTATION.to_owned(), json!(display_name));
        annotations.insert(DESCRIPTION_ANNOTATION.to_owned(), json!(description));
        project
    }

    /// A self-provisioning request, which non-admin users create instead of a `Project`
    pub fn project_request(name: &str, display_name: &str, description: &str) -> ResourceEnvelope {
        let mut request = ResourceEnvelope::new("ProjectRequest");
        request.set_name(name);
        request.set_field("displayName", json!(display_name));
        request.set_field("description", json!(description));
        request
    }

    pub fn service_account(name: &str) -> ResourceEnvelope {
        let mut service_account = ResourceEnvelope::new("ServiceAccount");
        service_account.set_name(name);
        service_account
    }

    /// A legacy RoleBinding for `role` with no subjects. The binding is named after the role.
    pub fn role_binding(namespace: &str, role: &str) -> ResourceEnvelope {
        let mut role_binding = ResourceEnvelope::with_api_version("RoleBinding", DEFAULT_API_VERSION);
        role_binding.set_name(role);
        role_binding.set_namespace(namespace);
        role_binding.set_field("roleRef", json!({ "name": role }));
        role_binding.set_field("subjects", Value::Array(Vec::new()));
        role_binding.set_field("userNames", Value::Array(Vec::new()));
        role_binding
    }

    pub fn role_binding_for_subject(namespace: &str, role: &str, subject: &Subject) -> ResourceEnvelope {
        let mut role_binding = ResourceFactory::role_binding(namespace, role);
        role_binding.set_field("subjects", json!([subject.to_value()]));
        role_binding.set_field("userNames", json!([subject.username()]));
        role_binding
    }

    pub fn secret(name: &str, secret_type: &str, data: BTreeMap<String, String>) -> ResourceEnvelope {
        let mut secret = ResourceEnvelope::new("Secret");
        secret.set_name(name);
        secret.set_field("type", json!(secret_type));
        secret.set_field("data", string_map(data));
        secret
    }

    pub fn config_map(name: &str, data: BTreeMap<String, String>) -> ResourceEnvelope {
        let mut config_map = ResourceEnvelope::new("ConfigMap");
        config_map.set_name(name);
        config_map.set_field("data", string_map(data));
        config_map
    }
}

fn string_map(data: BTreeMap<String, String>) -> Value {
    let map: JsonObject = data
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Value::Object(map)
}
