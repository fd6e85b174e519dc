//! Carries server-owned fields from an existing resource over to its replacement, so that a
//! PUT is accepted as an update of the same object instead of being rejected or resetting
//! fields the server doesn't allow to change.
use crate::resource::json_ext::{get_path, set_path};
use crate::resource::{ResourceEnvelope, RESOURCE_VERSION_KEY, UID_KEY};

use std::collections::HashMap;

/// Immutable fields for each kind, as dotted paths from the top of the resource
const DEFAULT_IMMUTABLE_FIELDS: &[(&str, &[&str])] = &[("service", &["spec.clusterIP"])];

#[derive(Debug, Clone)]
pub struct ImmutabilityPreserver {
    immutable_fields: HashMap<String, Vec<String>>,
}

impl Default for ImmutabilityPreserver {
    fn default() -> Self {
        ImmutabilityPreserver::new()
    }
}

impl ImmutabilityPreserver {
    pub fn new() -> ImmutabilityPreserver {
        let mut preserver = ImmutabilityPreserver {
            immutable_fields: HashMap::new(),
        };
        for (kind, paths) in DEFAULT_IMMUTABLE_FIELDS {
            preserver = preserver.with_immutable_fields(kind, paths.iter().copied());
        }
        preserver
    }

    /// Adds immutable field paths for a kind. Kinds are matched case-insensitively.
    pub fn with_immutable_fields<S: Into<String>>(
        mut self,
        kind: &str,
        paths: impl IntoIterator<Item = S>,
    ) -> Self {
        self.immutable_fields
            .entry(kind.to_lowercase())
            .or_insert_with(Vec::new)
            .extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn immutable_fields(&self, kind: &str) -> &[String] {
        self.immutable_fields
            .get(&kind.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Copies `metadata.uid` and `metadata.resourceVersion` from `old_resource` when it has them,
    /// then every immutable field registered for the kind that has a value in `old_resource`.
    pub fn preserve_immutability(
        &self,
        new_resource: &mut ResourceEnvelope,
        old_resource: &ResourceEnvelope,
    ) {
        for key in &[UID_KEY, RESOURCE_VERSION_KEY] {
            if let Some(value) = old_resource.metadata.get(*key) {
                new_resource.metadata.insert((*key).to_owned(), value.clone());
            }
        }

        for path in self.immutable_fields(&new_resource.kind) {
            if let Some(value) = get_field(old_resource, path) {
                log::debug!(
                    "Preserving immutable field '{}' of {}",
                    path,
                    old_resource
                );
                set_field(new_resource, path, value);
            }
        }
    }
}

fn get_field(resource: &ResourceEnvelope, path: &str) -> Option<serde_json::Value> {
    match path.split_once('.') {
        Some(("metadata", rest)) => get_path(&resource.metadata, rest).cloned(),
        _ => get_path(&resource.body, path).cloned(),
    }
}

fn set_field(resource: &mut ResourceEnvelope, path: &str, value: serde_json::Value) {
    match path.split_once('.') {
        Some(("metadata", rest)) => set_path(&mut resource.metadata, rest, value),
        _ => set_path(&mut resource.body, path, value),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::{json, Value};

    fn resource(value: Value) -> ResourceEnvelope {
        ResourceEnvelope::from_value(value).expect("invalid test resource")
    }

    #[test]
    fn copies_cluster_ip_into_resource_without_spec() {
        let old = resource(json!({
            "kind": "Service",
            "metadata": {"name": "api"},
            "spec": {"clusterIP": "1.2.3.4", "ports": [{"port": 8080}]}
        }));
        let mut new = resource(json!({
            "kind": "Service",
            "metadata": {"name": "api"}
        }));

        ImmutabilityPreserver::new().preserve_immutability(&mut new, &old);

        assert_eq!(
            json!({
                "kind": "Service",
                "apiVersion": "v1",
                "metadata": {"name": "api"},
                "spec": {"clusterIP": "1.2.3.4"}
            }),
            new.to_value()
        );
    }

    #[test]
    fn copies_uid_and_resource_version_for_any_kind() {
        let old = resource(json!({
            "kind": "BuildConfig",
            "metadata": {"name": "app", "uid": "u1", "resourceVersion": "7"}
        }));
        let mut new = resource(json!({
            "kind": "BuildConfig",
            "metadata": {"name": "app", "labels": {"x": "y"}},
            "spec": {"runPolicy": "Serial"}
        }));

        ImmutabilityPreserver::new().preserve_immutability(&mut new, &old);

        assert_eq!(Some("u1"), new.uid());
        assert_eq!(Some("7"), new.resource_version());
        assert_eq!(Some(&json!({"x": "y"})), new.metadata.get("labels"));
        assert_eq!(Some(&json!({"runPolicy": "Serial"})), new.field("spec"));
    }

    #[test]
    fn leaves_new_resource_alone_when_old_has_nothing_to_preserve() {
        let old = resource(json!({"kind": "Service", "metadata": {"name": "api"}}));
        let mut new = resource(json!({
            "kind": "Service",
            "metadata": {"name": "api"},
            "spec": {"clusterIP": "None"}
        }));
        let expected = new.clone();

        ImmutabilityPreserver::new().preserve_immutability(&mut new, &old);

        assert_eq!(expected, new);
    }

    #[test]
    fn table_is_open_for_new_kinds() {
        let preserver = ImmutabilityPreserver::new()
            .with_immutable_fields("PersistentVolumeClaim", vec!["spec.volumeName", "metadata.annotations"]);
        assert_eq!(
            &["spec.volumeName".to_owned(), "metadata.annotations".to_owned()][..],
            preserver.immutable_fields("persistentvolumeclaim")
        );

        let old = resource(json!({
            "kind": "PersistentVolumeClaim",
            "metadata": {"name": "data", "annotations": {"pv.kubernetes.io/bound-by-controller": "yes"}},
            "spec": {"volumeName": "pv-0001"}
        }));
        let mut new = resource(json!({"kind": "PersistentVolumeClaim", "metadata": {"name": "data"}}));
        preserver.preserve_immutability(&mut new, &old);

        assert_eq!(Some(&json!("pv-0001")), get_path(&new.body, "spec.volumeName"));
        assert_eq!(
            Some(&json!({"pv.kubernetes.io/bound-by-controller": "yes"})),
            new.metadata.get("annotations")
        );
    }
}
