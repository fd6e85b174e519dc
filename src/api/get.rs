use super::OpenShiftApi;
use crate::error::Error;
use crate::resource::{ApiResponse, ResourceEnvelope};

impl OpenShiftApi {
    /// Fetches a single named resource. The response is returned as is, so a 404 is just a
    /// response with a 404 status.
    pub async fn get(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        api_version: &str,
    ) -> Result<ApiResponse, Error> {
        let resource = ResourceEnvelope::named(kind, api_version, name);
        self.get_resource(&resource, namespace).await
    }

    /// Lists every resource of a kind in the namespace. An empty namespace lists cluster wide.
    pub async fn get_all_from_namespace(
        &self,
        kind: &str,
        namespace: &str,
        api_version: &str,
    ) -> Result<ApiResponse, Error> {
        let resource = ResourceEnvelope::with_api_version(kind, api_version);
        let url = self.collection_url(&resource, namespace)?;
        self.client.get(url).await
    }

    pub(crate) async fn get_resource(
        &self,
        resource: &ResourceEnvelope,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        let url = self.named_url(resource, namespace)?;
        self.client.get(url).await
    }
}

#[cfg(test)]
mod test {
    use crate::resource::DEFAULT_NAMESPACE;
    use crate::testkit::{run, FakeApiServer};
    use serde_json::json;

    #[test]
    fn get_returns_found_resource() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            server.insert(
                "/oapi/v1/namespaces/default/buildconfigs/app",
                json!({"kind": "BuildConfig", "apiVersion": "v1", "metadata": {"name": "app"}}),
            );
            let api = server.api();

            let response = api.get("BuildConfig", "app", DEFAULT_NAMESPACE, "v1").await.unwrap();

            assert_eq!(200, response.status);
            assert_eq!(Some("app"), response.resource().as_ref().and_then(|r| r.name()));
        });
    }

    #[test]
    fn get_returns_not_found_as_data() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = server.api();

            let response = api.get("Secret", "missing", "team-dev", "v1").await.unwrap();

            assert_eq!(404, response.status);
            assert_eq!(Some(&json!("NotFound")), response.data.get("reason"));
            let request = server.last_request().unwrap();
            assert_eq!("/api/v1/namespaces/team-dev/secrets/missing", request.path);
        });
    }

    #[test]
    fn get_all_from_namespace_lists_the_collection() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            server.insert(
                "/api/v1/namespaces/team-dev/configmaps/one",
                json!({"kind": "ConfigMap", "metadata": {"name": "one"}}),
            );
            server.insert(
                "/api/v1/namespaces/team-dev/configmaps/two",
                json!({"kind": "ConfigMap", "metadata": {"name": "two"}}),
            );
            server.insert(
                "/api/v1/namespaces/other/configmaps/three",
                json!({"kind": "ConfigMap", "metadata": {"name": "three"}}),
            );
            let api = server.api();

            let response = api
                .get_all_from_namespace("ConfigMap", "team-dev", "v1")
                .await
                .unwrap();

            assert_eq!(200, response.status);
            assert_eq!(2, response.items().len());
        });
    }
}
