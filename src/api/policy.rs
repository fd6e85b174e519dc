//! RoleBinding reconciliation, the equivalent of `oc policy add-role-to-user` and
//! `oc policy remove-role-from-user`.
//!
//! Bindings are looked up by listing the legacy `RoleBinding`s in the namespace and picking the
//! one named after the role. Both operations read, modify, and write the binding without any
//! conflict handling of their own.
use super::OpenShiftApi;
use crate::error::Error;
use crate::resource::json_ext::ResourceJson;
use crate::resource::{ApiResponse, ResourceEnvelope, ResourceFactory, Subject, DEFAULT_API_VERSION};

use serde_json::Value;

const ROLE_BINDING_KIND: &str = "RoleBinding";
const SUBJECTS_FIELD: &str = "subjects";
const USER_NAMES_FIELD: &str = "userNames";

/// How `add_role_to_users` decides whether a subject is already bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectMatch {
    /// A subject with the same kind, name, and namespace is never added twice, and `userNames`
    /// is always derived from the resulting `subjects`.
    ByValue,
    /// Every requested subject is appended, even when an identical one is already bound, and
    /// `userNames` is reset to exactly the requested user names. Matches the behavior of older
    /// provisioning tooling that some deployments still depend on.
    ByReference,
}

impl Default for SubjectMatch {
    fn default() -> Self {
        SubjectMatch::ByValue
    }
}

enum Lookup {
    Found(ResourceEnvelope),
    Missing,
    Failed(ApiResponse),
}

pub struct OpenShiftApiPolicy<'a> {
    api: &'a OpenShiftApi,
    subject_match: SubjectMatch,
}

impl<'a> OpenShiftApiPolicy<'a> {
    pub fn new(api: &'a OpenShiftApi, subject_match: SubjectMatch) -> OpenShiftApiPolicy<'a> {
        OpenShiftApiPolicy { api, subject_match }
    }

    /// Binds `role` to each of the users in `namespace`. User names of the form
    /// `system:serviceaccount:<namespace>:<name>` are bound as ServiceAccount subjects.
    ///
    /// A new binding is POSTed to the collection, an existing one is PUT back in place. If the
    /// RoleBindings can't be listed, that response is returned and nothing is written.
    pub async fn add_role_to_users<I>(
        &self,
        usernames: I,
        role: &str,
        namespace: &str,
    ) -> Result<ApiResponse, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let subjects: Vec<Subject> = usernames
            .into_iter()
            .map(|username| Subject::from_username(username.as_ref()))
            .collect();

        let (mut binding, exists) = match self.find_role_binding(role, namespace).await? {
            Lookup::Found(binding) => (binding, true),
            Lookup::Missing => (ResourceFactory::role_binding(namespace, role), false),
            Lookup::Failed(response) => return Ok(response),
        };

        match self.subject_match {
            SubjectMatch::ByValue => merge_by_value(&mut binding, &subjects),
            SubjectMatch::ByReference => merge_by_reference(&mut binding, &subjects),
        }
        log::info!(
            "Binding role '{}' in namespace '{}' to {} subject(s), existing binding: {}",
            role,
            namespace,
            subjects.len(),
            exists
        );

        if exists {
            self.update_role_binding(&binding, role, namespace).await
        } else {
            let url = self.api.collection_url(&binding, namespace)?;
            self.api.client.post(url, &binding.to_value()).await
        }
    }

    /// Removes a plain user from the binding for `role`. Returns `None` when there was nothing
    /// to do: the user name is a service account, which can't be removed this way, or no
    /// binding exists for the role.
    pub async fn remove_role_from_user(
        &self,
        username: &str,
        role: &str,
        namespace: &str,
    ) -> Result<Option<ApiResponse>, Error> {
        if Subject::is_service_account_username(username) {
            log::warn!(
                "Not removing role '{}' from service account '{}', only users can be removed",
                role,
                username
            );
            return Ok(None);
        }

        let mut binding = match self.find_role_binding(role, namespace).await? {
            Lookup::Found(binding) => binding,
            Lookup::Missing => {
                log::debug!(
                    "No binding for role '{}' in namespace '{}', nothing to remove",
                    role,
                    namespace
                );
                return Ok(None);
            }
            Lookup::Failed(response) => return Ok(Some(response)),
        };

        let subjects = array_field(&binding, SUBJECTS_FIELD)
            .into_iter()
            .filter(|subject| subject.get("name").and_then(Value::as_str) != Some(username))
            .collect();
        let user_names = array_field(&binding, USER_NAMES_FIELD)
            .into_iter()
            .filter(|name| name.as_str() != Some(username))
            .collect();
        binding.set_field(SUBJECTS_FIELD, Value::Array(subjects));
        binding.set_field(USER_NAMES_FIELD, Value::Array(user_names));

        log::info!(
            "Removing user '{}' from role '{}' in namespace '{}'",
            username,
            role,
            namespace
        );
        self.update_role_binding(&binding, role, namespace)
            .await
            .map(Some)
    }

    async fn find_role_binding(&self, role: &str, namespace: &str) -> Result<Lookup, Error> {
        let response = self
            .api
            .get_all_from_namespace(ROLE_BINDING_KIND, namespace, DEFAULT_API_VERSION)
            .await?;
        if !response.is_success() {
            log::warn!(
                "Failed to list RoleBindings in namespace '{}': {}",
                namespace,
                response
            );
            return Ok(Lookup::Failed(response));
        }

        let role = role.to_lowercase();
        let namespace = namespace.to_lowercase();
        let found = response.items().iter().find(|item| {
            item.get_name() == Some(role.as_str())
                && item.get_namespace() == Some(namespace.as_str())
        });
        let mut item = match found {
            Some(item) => item.clone(),
            None => return Ok(Lookup::Missing),
        };

        // items of a list response usually leave out the type
        if let Value::Object(ref mut map) = item {
            map.entry("kind")
                .or_insert_with(|| Value::String(ROLE_BINDING_KIND.to_owned()));
            map.entry("apiVersion")
                .or_insert_with(|| Value::String(DEFAULT_API_VERSION.to_owned()));
        }
        let binding = ResourceEnvelope::from_value(item)?;
        Ok(Lookup::Found(binding))
    }

    async fn update_role_binding(
        &self,
        binding: &ResourceEnvelope,
        role: &str,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        let path = format!("{}/{}", self.api.router.kind_url(binding, namespace), role);
        let url = self
            .api
            .router
            .absolute_url(&self.api.client.config().connection, binding, &path)?;
        self.api.client.put(url, &binding.to_value()).await
    }
}

fn array_field(resource: &ResourceEnvelope, key: &str) -> Vec<Value> {
    resource
        .field(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn merge_by_value(binding: &mut ResourceEnvelope, subjects: &[Subject]) {
    let mut bound = array_field(binding, SUBJECTS_FIELD);
    for subject in subjects {
        if bound.iter().any(|existing| subject.matches(existing)) {
            log::debug!("{} is already bound", subject);
            continue;
        }
        bound.push(subject.to_value());
    }
    let user_names = bound
        .iter()
        .filter_map(Subject::username_of)
        .map(Value::String)
        .collect();
    binding.set_field(SUBJECTS_FIELD, Value::Array(bound));
    binding.set_field(USER_NAMES_FIELD, Value::Array(user_names));
}

fn merge_by_reference(binding: &mut ResourceEnvelope, subjects: &[Subject]) {
    let mut bound = array_field(binding, SUBJECTS_FIELD);
    let mut user_names = Vec::with_capacity(subjects.len());
    for subject in subjects {
        bound.push(subject.to_value());
        user_names.push(Value::String(subject.username()));
    }
    binding.set_field(SUBJECTS_FIELD, Value::Array(bound));
    binding.set_field(USER_NAMES_FIELD, Value::Array(user_names));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testkit::{run, FakeApiServer};
    use serde_json::json;

    const BINDINGS: &str = "/oapi/v1/namespaces/ns1/rolebindings";

    fn existing_admin_binding(server: &FakeApiServer) {
        server.insert(
            "/oapi/v1/namespaces/ns1/rolebindings/admin",
            json!({
                "kind": "RoleBinding",
                "apiVersion": "v1",
                "metadata": {"name": "admin", "namespace": "ns1"},
                "roleRef": {"name": "admin"},
                "subjects": [{"kind": "User", "name": "bob"}],
                "userNames": ["bob"]
            }),
        );
    }

    #[test]
    fn new_binding_is_posted_with_user_subject() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = server.api();

            let response = api
                .policy()
                .add_role_to_users(vec!["alice"], "admin", "ns1")
                .await
                .unwrap();

            assert_eq!(201, response.status);
            let post = server.last_request().unwrap();
            assert_eq!("POST", post.method);
            assert_eq!(BINDINGS, post.path);
            assert_eq!(Some(&json!([{"kind": "User", "name": "alice"}])), post.body.get("subjects"));
            assert_eq!(Some(&json!(["alice"])), post.body.get("userNames"));
            assert_eq!(Some(&json!("admin")), post.body.pointer("/roleRef/name"));
        });
    }

    #[test]
    fn service_account_username_becomes_service_account_subject() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = server.api();

            api.policy()
                .add_role_to_users(&["system:serviceaccount:ns2:sa1"], "edit", "ns1")
                .await
                .unwrap();

            let post = server.last_request().unwrap();
            assert_eq!(
                Some(&json!([{"kind": "ServiceAccount", "namespace": "ns2", "name": "sa1"}])),
                post.body.get("subjects")
            );
            assert_eq!(
                Some(&json!(["system:serviceaccount:ns2:sa1"])),
                post.body.get("userNames")
            );
        });
    }

    #[test]
    fn existing_binding_is_put_back_in_place() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            existing_admin_binding(&server);
            let api = server.api();

            let response = api
                .policy()
                .add_role_to_users(vec!["alice".to_owned()], "admin", "ns1")
                .await
                .unwrap();

            assert_eq!(200, response.status);
            let put = server.last_request().unwrap();
            assert_eq!("PUT", put.method);
            assert_eq!(format!("{}/admin", BINDINGS), put.path);
            assert_eq!(
                Some(&json!([{"kind": "User", "name": "bob"}, {"kind": "User", "name": "alice"}])),
                put.body.get("subjects")
            );
            assert_eq!(Some(&json!(["bob", "alice"])), put.body.get("userNames"));
            assert!(server.requests_with_method("POST").is_empty());
        });
    }

    #[test]
    fn matching_by_value_never_duplicates_subjects() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = server.api();

            for _ in 0..2 {
                api.policy()
                    .add_role_to_users(vec!["alice"], "admin", "ns1")
                    .await
                    .unwrap();
            }

            let stored = server.object(&format!("{}/admin", BINDINGS)).unwrap();
            assert_eq!(Some(&json!([{"kind": "User", "name": "alice"}])), stored.get("subjects"));
            assert_eq!(Some(&json!(["alice"])), stored.get("userNames"));
        });
    }

    #[test]
    fn matching_by_reference_appends_every_time() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = server.api().with_subject_match(SubjectMatch::ByReference);

            for _ in 0..2 {
                api.policy()
                    .add_role_to_users(vec!["alice"], "admin", "ns1")
                    .await
                    .unwrap();
            }

            let stored = server.object(&format!("{}/admin", BINDINGS)).unwrap();
            assert_eq!(
                Some(&json!([{"kind": "User", "name": "alice"}, {"kind": "User", "name": "alice"}])),
                stored.get("subjects")
            );
            assert_eq!(Some(&json!(["alice"])), stored.get("userNames"));
        });
    }

    #[test]
    fn matching_by_reference_resets_user_names() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            existing_admin_binding(&server);
            let api = server.api().with_subject_match(SubjectMatch::ByReference);

            api.policy()
                .add_role_to_users(vec!["alice"], "admin", "ns1")
                .await
                .unwrap();

            let put = server.last_request().unwrap();
            assert_eq!(Some(&json!(["alice"])), put.body.get("userNames"));
        });
    }

    #[test]
    fn failed_lookup_is_returned_without_writing() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            server.fail("GET", BINDINGS, 403);
            let api = server.api();

            let response = api
                .policy()
                .add_role_to_users(vec!["alice"], "admin", "ns1")
                .await
                .unwrap();

            assert_eq!(403, response.status);
            assert_eq!(1, server.requests().len());
        });
    }

    #[test]
    fn remove_filters_the_user_out() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            existing_admin_binding(&server);
            let api = server.api();
            api.policy()
                .add_role_to_users(vec!["alice"], "admin", "ns1")
                .await
                .unwrap();

            let response = api
                .policy()
                .remove_role_from_user("bob", "admin", "ns1")
                .await
                .unwrap()
                .expect("expected the binding to be updated");

            assert_eq!(200, response.status);
            let put = server.last_request().unwrap();
            assert_eq!(format!("{}/admin", BINDINGS), put.path);
            assert_eq!(Some(&json!([{"kind": "User", "name": "alice"}])), put.body.get("subjects"));
            assert_eq!(Some(&json!(["alice"])), put.body.get("userNames"));
        });
    }

    #[test]
    fn remove_of_service_account_does_nothing() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            existing_admin_binding(&server);
            let api = server.api();

            let response = api
                .policy()
                .remove_role_from_user("system:serviceaccount:ns1:jenkins", "admin", "ns1")
                .await
                .unwrap();

            assert_eq!(None, response);
            assert!(server.requests().is_empty());
        });
    }

    #[test]
    fn incomplete_service_account_name_is_removed_like_a_user() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            existing_admin_binding(&server);
            let api = server.api();
            let username = "system:serviceaccount:only-ns";
            api.policy()
                .add_role_to_users(vec![username], "admin", "ns1")
                .await
                .unwrap();
            let binding = server.object(&format!("{}/admin", BINDINGS)).unwrap();
            assert_eq!(
                Some(&json!({"kind": "User", "name": username})),
                binding.pointer("/subjects/1")
            );

            let response = api
                .policy()
                .remove_role_from_user(username, "admin", "ns1")
                .await
                .unwrap()
                .expect("expected the binding to be updated");

            assert_eq!(200, response.status);
            let binding = server.object(&format!("{}/admin", BINDINGS)).unwrap();
            assert_eq!(Some(&json!([{"kind": "User", "name": "bob"}])), binding.get("subjects"));
            assert_eq!(Some(&json!(["bob"])), binding.get("userNames"));
        });
    }

    #[test]
    fn remove_without_binding_does_nothing() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = server.api();

            let response = api
                .policy()
                .remove_role_from_user("bob", "view", "ns1")
                .await
                .unwrap();

            assert_eq!(None, response);
            assert!(server.requests_with_method("PUT").is_empty());
        });
    }

    #[test]
    fn merge_by_value_keeps_user_names_in_step_with_subjects() {
        let mut binding = ResourceFactory::role_binding("ns1", "edit");
        let subjects = vec![
            Subject::from_username("alice"),
            Subject::from_username("system:serviceaccount:ns1:jenkins"),
            Subject::from_username("alice"),
        ];

        merge_by_value(&mut binding, &subjects);

        assert_eq!(2, array_field(&binding, SUBJECTS_FIELD).len());
        assert_eq!(
            vec![json!("alice"), json!("system:serviceaccount:ns1:jenkins")],
            array_field(&binding, USER_NAMES_FIELD)
        );
    }
}
