use super::OpenShiftApi;
use crate::client::MergeStrategy;
use crate::error::Error;
use crate::resource::{ApiResponse, ResourceEnvelope};

use serde_json::Value;

impl OpenShiftApi {
    /// Sends a strategic merge patch built from the resource's body fields. The resource's kind
    /// and apiVersion are only used to find the url, and are never part of the patch. Its
    /// metadata is included unless `delete_metadata` is true.
    pub async fn patch(
        &self,
        resource: ResourceEnvelope,
        namespace: &str,
        delete_metadata: bool,
    ) -> Result<ApiResponse, Error> {
        let url = self.named_url(&resource, namespace)?;
        log::info!("Patching {} in namespace '{}'", resource, namespace);

        let ResourceEnvelope { metadata, mut body, .. } = resource;
        if !delete_metadata {
            body.insert("metadata".to_owned(), Value::Object(metadata));
        }
        self.client
            .patch(url, &Value::Object(body), MergeStrategy::StrategicMerge)
            .await
    }
}
