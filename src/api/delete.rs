use super::OpenShiftApi;
use crate::error::Error;
use crate::resource::{ApiResponse, ResourceEnvelope};

impl OpenShiftApi {
    /// Deletes a single named resource. Deleting something that does not exist is a 404
    /// response, not an error.
    pub async fn delete(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        api_version: &str,
    ) -> Result<ApiResponse, Error> {
        let resource = ResourceEnvelope::named(kind, api_version, name);
        let url = self.named_url(&resource, namespace)?;
        log::info!("Deleting {} from namespace '{}'", resource, namespace);
        self.client.delete(url).await
    }
}

#[cfg(test)]
mod test {
    use crate::testkit::{run, FakeApiServer};
    use serde_json::json;

    #[test]
    fn delete_removes_the_resource() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let path = "/oapi/v1/namespaces/team-dev/routes/app";
            server.insert(path, json!({"kind": "Route", "metadata": {"name": "app"}}));
            let api = server.api();

            let response = api.delete("Route", "app", "team-dev", "v1").await.unwrap();

            assert_eq!(200, response.status);
            assert_eq!(None, server.object(path));
            assert_eq!("DELETE", server.last_request().unwrap().method);
        });
    }

    #[test]
    fn delete_of_missing_resource_is_not_found() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = server.api();

            let response = api.delete("Secret", "gone", "team-dev", "v1").await.unwrap();

            assert_eq!(404, response.status);
        });
    }
}
