//! The `OpenShiftApi` client and the operations it exposes.
//!
//! Every operation returns `Ok(ApiResponse)` once the server has answered, whatever the status
//! code. `Err` is only returned when no answer was received (connection, TLS, timeout) or when a
//! resource is unusable before anything is sent (no `metadata.name` for a named operation).
//!
//! None of the read-then-write operations (`replace`, the RBAC operations, the pod network
//! join) do any optimistic concurrency handling beyond sending back the `resourceVersion` they
//! read. If the resource changes between the GET and the PUT, the write either fails with a 409
//! from the server or overwrites the change. Callers that need more can wrap the operation in
//! `retry::retry_on_conflict`.
mod adm;
mod create;
mod delete;
mod get;
mod patch;
mod policy;

pub use self::adm::{OpenShiftApiAdm, CHANGE_NETWORK_ANNOTATION};
pub use self::policy::{OpenShiftApiPolicy, SubjectMatch};

use crate::client::{Client, Metrics};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::resource::{ImmutabilityPreserver, ResourceEnvelope};
use crate::resource_url::ResourceRouter;

use url::Url;

use std::io;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct OpenShiftApi {
    client: Client,
    router: Arc<ResourceRouter>,
    preserver: Arc<ImmutabilityPreserver>,
    subject_match: SubjectMatch,
}

impl OpenShiftApi {
    /// Creates a client with its own, private metrics registry
    pub fn new(config: ClientConfig) -> Result<OpenShiftApi, io::Error> {
        OpenShiftApi::with_metrics(config, &Metrics::new())
    }

    pub fn with_metrics(config: ClientConfig, metrics: &Metrics) -> Result<OpenShiftApi, io::Error> {
        let client = Client::new(config, metrics.client_metrics())?;
        Ok(OpenShiftApi {
            client,
            router: Arc::new(ResourceRouter::new()),
            preserver: Arc::new(ImmutabilityPreserver::new()),
            subject_match: SubjectMatch::default(),
        })
    }

    pub fn with_router(mut self, router: ResourceRouter) -> Self {
        self.router = Arc::new(router);
        self
    }

    pub fn with_immutability_preserver(mut self, preserver: ImmutabilityPreserver) -> Self {
        self.preserver = Arc::new(preserver);
        self
    }

    pub fn with_subject_match(mut self, subject_match: SubjectMatch) -> Self {
        self.subject_match = subject_match;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn router(&self) -> &ResourceRouter {
        &self.router
    }

    pub fn policy(&self) -> OpenShiftApiPolicy<'_> {
        OpenShiftApiPolicy::new(self, self.subject_match)
    }

    pub fn adm(&self) -> OpenShiftApiAdm<'_> {
        OpenShiftApiAdm::new(self)
    }

    fn collection_url(&self, resource: &ResourceEnvelope, namespace: &str) -> Result<Url, Error> {
        let path = self.router.kind_url(resource, namespace);
        self.router
            .absolute_url(&self.client.config().connection, resource, &path)
    }

    fn named_url(&self, resource: &ResourceEnvelope, namespace: &str) -> Result<Url, Error> {
        let path = self.router.named_url(resource, namespace)?;
        self.router
            .absolute_url(&self.client.config().connection, resource, &path)
    }
}
