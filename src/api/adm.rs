use super::OpenShiftApi;
use crate::error::Error;
use crate::resource::{ApiResponse, DEFAULT_API_VERSION};

use serde_json::Value;

/// Setting this annotation on a NetNamespace asks the multitenant sdn plugin to move the
/// namespace onto another project's network
pub const CHANGE_NETWORK_ANNOTATION: &str = "pod.network.openshift.io/multitenant.change-network";

const CLUSTER_NETWORK_NAME: &str = "default";

/// Cluster administration operations, the equivalent of `oc adm`
pub struct OpenShiftApiAdm<'a> {
    api: &'a OpenShiftApi,
}

impl<'a> OpenShiftApiAdm<'a> {
    pub fn new(api: &'a OpenShiftApi) -> OpenShiftApiAdm<'a> {
        OpenShiftApiAdm { api }
    }

    /// Joins the pod network of `project_to_join` to that of `project_to_join_to`.
    ///
    /// Clusters without the multitenant network plugin have no `ClusterNetwork/default`. In that
    /// case the failed lookup is returned as is, and callers usually treat a 404 here as nothing
    /// to do. A failed lookup of the project's NetNamespace is returned the same way.
    pub async fn pod_network_join_to_project(
        &self,
        project_to_join: &str,
        project_to_join_to: &str,
    ) -> Result<ApiResponse, Error> {
        let cluster_network = self
            .api
            .get("ClusterNetwork", CLUSTER_NETWORK_NAME, "", DEFAULT_API_VERSION)
            .await?;
        if !cluster_network.is_success() {
            log::warn!(
                "Cluster network is not available, status: {}. Not joining '{}' to '{}'",
                cluster_network.status,
                project_to_join,
                project_to_join_to
            );
            return Ok(cluster_network);
        }

        let net_namespace = self
            .api
            .get("NetNamespace", project_to_join, "", DEFAULT_API_VERSION)
            .await?;
        if !net_namespace.is_success() {
            log::warn!(
                "Failed to get the NetNamespace of '{}', status: {}",
                project_to_join,
                net_namespace.status
            );
            return Ok(net_namespace);
        }

        let mut net_namespace = match net_namespace.resource() {
            Some(resource) => resource,
            None => {
                return Err(Error::invalid_resource(
                    "NetNamespace response is not a resource",
                    net_namespace.data,
                ))
            }
        };
        net_namespace.annotations_mut().insert(
            CHANGE_NETWORK_ANNOTATION.to_owned(),
            Value::String(format!("join:{}", project_to_join_to)),
        );

        log::info!(
            "Joining the pod network of '{}' to '{}'",
            project_to_join,
            project_to_join_to
        );
        let url = self.api.named_url(&net_namespace, "")?;
        self.api.client.put(url, &net_namespace.to_value()).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testkit::{run, FakeApiServer};
    use serde_json::json;

    const CLUSTER_NETWORK: &str = "/oapi/v1/clusternetworks/default";
    const NET_NAMESPACE: &str = "/oapi/v1/netnamespaces/team-dev";

    #[test]
    fn join_stops_when_cluster_network_is_missing() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            server.insert(
                NET_NAMESPACE,
                json!({"kind": "NetNamespace", "metadata": {"name": "team-dev"}, "netid": 12}),
            );
            let api = server.api();

            let response = api
                .adm()
                .pod_network_join_to_project("team-dev", "team-prod")
                .await
                .unwrap();

            assert_eq!(404, response.status);
            let requests = server.requests();
            assert_eq!(1, requests.len());
            assert_eq!(CLUSTER_NETWORK, requests[0].path);
        });
    }

    #[test]
    fn join_stops_when_net_namespace_is_missing() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            server.insert(
                CLUSTER_NETWORK,
                json!({"kind": "ClusterNetwork", "metadata": {"name": "default"}}),
            );
            let api = server.api();

            let response = api
                .adm()
                .pod_network_join_to_project("team-dev", "team-prod")
                .await
                .unwrap();

            assert_eq!(404, response.status);
            assert!(server.requests_with_method("PUT").is_empty());
        });
    }

    #[test]
    fn join_annotates_the_net_namespace() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            server.insert(
                CLUSTER_NETWORK,
                json!({"kind": "ClusterNetwork", "metadata": {"name": "default"}}),
            );
            server.insert(
                NET_NAMESPACE,
                json!({
                    "kind": "NetNamespace",
                    "apiVersion": "v1",
                    "metadata": {"name": "team-dev", "annotations": {(CHANGE_NETWORK_ANNOTATION): "join:old"}},
                    "netid": 12
                }),
            );
            let api = server.api();

            let response = api
                .adm()
                .pod_network_join_to_project("team-dev", "team-prod")
                .await
                .unwrap();

            assert_eq!(200, response.status);
            let put = server.last_request().unwrap();
            assert_eq!("PUT", put.method);
            assert_eq!(NET_NAMESPACE, put.path);
            assert_eq!(
                Some(&json!("join:team-prod")),
                put.body
                    .pointer("/metadata/annotations")
                    .and_then(|a| a.get(CHANGE_NETWORK_ANNOTATION))
            );
            assert_eq!(Some(&json!(12)), put.body.get("netid"));
        });
    }
}
