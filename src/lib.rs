//! A client for the OpenShift resource api that turns a few declarative intents into the right
//! sequence of http requests.
//!
//! The intents are create, apply (create if absent), replace (update in place, keeping the
//! server assigned identity and immutable fields), and strategic merge patch. Any of them also
//! accepts a `List` resource, in which case each item is handled in order and the results are
//! aggregated. On top of that, `policy()` reconciles RoleBindings the way `oc policy` does, and
//! `adm()` joins project pod networks.
//!
//! Every operation returns an `ApiResponse` with the status code and body from the server, even
//! for a 404 or a 409. An `Err` means that no response was received at all.
//!
//! ```no_run
//! use subatomic_openshift::prelude::*;
//! use subatomic_openshift::serde_json::json;
//!
//! # async fn provision() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://openshift.dev.local:8443", "my-token");
//! let api = OpenShiftApi::new(config)?;
//!
//! let project = ResourceFactory::project_request("team-dev", "Team Dev", "Dev environment");
//! let response = api.create(project, "").await?;
//! if !response.is_success() && !response.is_conflict() {
//!     println!("failed to create project: {}", response);
//! }
//!
//! let image_stream = ResourceEnvelope::from_value(json!({
//!     "kind": "ImageStream",
//!     "metadata": {"name": "app"},
//! }))?;
//! api.apply(image_stream, "team-dev").await?;
//!
//! api.policy()
//!     .add_role_to_users(vec!["alice", "system:serviceaccount:team-dev:jenkins"], "edit", "team-dev")
//!     .await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate serde_derive;

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod k8s_types;
pub mod resource;
pub mod resource_url;
pub mod retry;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use serde;
pub use serde_json;

pub mod prelude {
    pub use crate::api::{OpenShiftApi, SubjectMatch};
    pub use crate::config::{ClientConfig, ClusterConnection};
    pub use crate::error::Error;
    pub use crate::k8s_types::{self, K8sType};
    pub use crate::resource::{
        ApiResponse, ImmutabilityPreserver, ResourceEnvelope, ResourceFactory, Subject,
    };
    pub use crate::resource_url::ResourceRouter;
}
