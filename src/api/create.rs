//! Declarative create, apply, and replace, including the fan out of `List` resources.
//!
//! `apply` means "create if absent". It never compares or updates an existing resource, so two
//! applies with different bodies leave whatever the first one created. Use `replace` when the
//! server side object should end up matching the given resource.
use super::OpenShiftApi;
use crate::error::Error;
use crate::resource::{ApiResponse, ResourceEnvelope};

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Create,
    Apply,
    Replace,
}

impl OpenShiftApi {
    /// POSTs the resource to its collection, after removing the server assigned `uid` and
    /// `resourceVersion`. A `List` is created item by item.
    pub async fn create(
        &self,
        resource: ResourceEnvelope,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        self.dispatch(resource, namespace, Intent::Create).await
    }

    /// `create`, or `apply` when `apply` is true
    pub async fn submit(
        &self,
        resource: ResourceEnvelope,
        namespace: &str,
        apply: bool,
    ) -> Result<ApiResponse, Error> {
        let intent = if apply { Intent::Apply } else { Intent::Create };
        self.dispatch(resource, namespace, intent).await
    }

    /// Creates the resource unless it already exists, in which case the existing resource is
    /// returned untouched.
    pub async fn apply(
        &self,
        resource: ResourceEnvelope,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        self.dispatch(resource, namespace, Intent::Apply).await
    }

    /// Updates the resource in place if it exists, carrying over its `uid`, `resourceVersion`,
    /// and any immutable fields. Creates it otherwise.
    pub async fn replace(
        &self,
        resource: ResourceEnvelope,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        self.dispatch(resource, namespace, Intent::Replace).await
    }

    /// Boxed so that a `List` item which is itself a `List` can be dispatched again.
    fn dispatch<'a>(
        &'a self,
        resource: ResourceEnvelope,
        namespace: &'a str,
        intent: Intent,
    ) -> BoxFuture<'a, Result<ApiResponse, Error>> {
        async move {
            if resource.is_list() {
                return self.fan_out(resource, namespace, intent).await;
            }
            match intent {
                Intent::Create => self.create_one(resource, namespace).await,
                Intent::Apply => self.apply_one(resource, namespace).await,
                Intent::Replace => self.replace_one(resource, namespace).await,
            }
        }
        .boxed()
    }

    /// Processes the items of a List sequentially and in order. The aggregate status is 200
    /// when every item succeeded and 400 otherwise, with each item's own status in `items`. A
    /// nested List is processed the same way and shows up as one item with its own aggregate.
    ///
    /// Every item, nested ones included, is checked before the first request, so a List that
    /// can not be routed is rejected without leaving part of it written.
    async fn fan_out(
        &self,
        list: ResourceEnvelope,
        namespace: &str,
        intent: Intent,
    ) -> Result<ApiResponse, Error> {
        let items = list.items()?;
        check_items(&items, intent)?;

        let total = items.len();
        let mut results = Vec::with_capacity(total);
        let mut all_succeeded = true;
        for (index, item) in items.into_iter().enumerate() {
            log::debug!("{:?} List item {} of {}: {}", intent, index + 1, total, item);
            let response = self
                .dispatch(item, namespace, intent)
                .await
                .map_err(|err| {
                    log::error!(
                        "{:?} of List aborted at item {} of {} after {} items were processed: {}",
                        intent,
                        index + 1,
                        total,
                        index,
                        err
                    );
                    err
                })?;
            all_succeeded &= response.is_success();
            results.push(json!({
                "data": response.data,
                "status": response.status,
            }));
        }

        let status = if all_succeeded { 200 } else { 400 };
        if !all_succeeded {
            log::warn!(
                "{:?} of List in namespace '{}' had failing items",
                intent,
                namespace
            );
        }
        Ok(ApiResponse::new(status, json!({ "items": Value::Array(results) })))
    }

    async fn create_one(
        &self,
        mut resource: ResourceEnvelope,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        resource.strip_server_identity();
        let url = self.collection_url(&resource, namespace)?;
        log::info!("Creating {} in namespace '{}'", resource, namespace);
        self.client.post(url, &resource.to_value()).await
    }

    async fn apply_one(
        &self,
        resource: ResourceEnvelope,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        let existing = self.get_resource(&resource, namespace).await?;
        if existing.is_success() {
            log::debug!(
                "{} already exists in namespace '{}', leaving it as is",
                resource,
                namespace
            );
            return Ok(existing);
        }
        self.create_one(resource, namespace).await
    }

    async fn replace_one(
        &self,
        mut resource: ResourceEnvelope,
        namespace: &str,
    ) -> Result<ApiResponse, Error> {
        resource.strip_server_identity();
        let existing = self.get_resource(&resource, namespace).await?;
        if !existing.is_success() {
            log::info!(
                "{} does not exist in namespace '{}', creating it instead of replacing",
                resource,
                namespace
            );
            let url = self.collection_url(&resource, namespace)?;
            return self.client.post(url, &resource.to_value()).await;
        }

        if let Some(existing) = existing.resource() {
            self.preserver.preserve_immutability(&mut resource, &existing);
        }
        let url = self.named_url(&resource, namespace)?;
        log::info!("Replacing {} in namespace '{}'", resource, namespace);
        self.client.put(url, &resource.to_value()).await
    }
}

/// Apply and replace start with a GET of the named resource, so they need a name on every leaf.
fn check_items(items: &[ResourceEnvelope], intent: Intent) -> Result<(), Error> {
    for item in items {
        if item.is_list() {
            check_items(&item.items()?, intent)?;
        } else if intent != Intent::Create {
            item.require_name()?;
        }
    }
    Ok(())
}
