//! Static routing rows for the resource kinds that get managed on a cluster.
//!
//! Each `K8sType` says which api family serves a `(kind, apiVersion)` pair and which url path
//! segment its collection lives under. These are only the _exceptions_ to the default rule:
//! a kind without a row is routed to the legacy api with a lower-cased, pluralized kind.
//! You can define your own rows simply by declaring a static:
//!
//! ```no_run
//! use subatomic_openshift::k8s_types::{ApiFamily, K8sType};
//!
//! #[allow(non_upper_case_globals)]
//! pub static Policy: &K8sType = &K8sType {
//!     api_version: "v1",
//!     kind: "Policy",
//!     plural_kind: "policies",
//!     family: ApiFamily::Oapi,
//! };
//! ```
//!
//! and passing it to `ResourceRouter::with_route`.
use std::fmt::{self, Display};

/// The two url families served by an OpenShift master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiFamily {
    /// The legacy OpenShift api, served under `/oapi/{apiVersion}`
    Oapi,
    /// The Kubernetes api, served under `/api/v1` or `/apis/{group}/{version}`
    Api,
}

impl Display for ApiFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ApiFamily::Oapi => f.write_str("OAPI"),
            ApiFamily::Api => f.write_str("API"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct K8sType {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub plural_kind: &'static str,
    pub family: ApiFamily,
}

impl Display for K8sType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{} ({})", self.api_version, self.plural_kind, self.family)
    }
}

macro_rules! k8s_type {
    ($ref_name:ident, $family:ident, $api_version:expr, $plural_kind:ident) => {
        #[allow(non_upper_case_globals)]
        pub static $ref_name: &crate::k8s_types::K8sType = &crate::k8s_types::K8sType {
            api_version: $api_version,
            kind: stringify!($ref_name),
            plural_kind: stringify!($plural_kind),
            family: crate::k8s_types::ApiFamily::$family,
        };
    };
}

macro_rules! def_types {
    ($family:ident, $version:ident, $version_str:expr, [ $( $kind:ident ~ $plural_kind:ident ),* ]) => {
        pub mod $version {
            $(
                k8s_type!($kind, $family, $version_str, $plural_kind);
            )*
        }
    };
}

/// Kinds served by the legacy `/oapi/v1` endpoints
pub mod oapi {
    def_types!(Oapi, v1, "v1", [
        Project ~ projects,
        ProjectRequest ~ projectrequests,
        RoleBinding ~ rolebindings,
        BuildConfig ~ buildconfigs,
        DeploymentConfig ~ deploymentconfigs,
        ImageStream ~ imagestreams,
        ImageStreamTag ~ imagestreamtags,
        Route ~ routes,
        Template ~ templates,
        ClusterNetwork ~ clusternetworks,
        NetNamespace ~ netnamespaces
    ]);
}

/// Kinds served by the core `/api/v1` endpoints
pub mod kube {
    def_types!(Api, v1, "v1", [
        Namespace ~ namespaces,
        ServiceAccount ~ serviceaccounts,
        Secret ~ secrets,
        ConfigMap ~ configmaps,
        Service ~ services,
        PersistentVolumeClaim ~ persistentvolumeclaims,
        ResourceQuota ~ resourcequotas,
        LimitRange ~ limitranges
    ]);
}

/// Kinds served from api groups under `/apis`
pub mod rbac {
    k8s_type!(
        RoleBinding,
        Api,
        "rbac.authorization.k8s.io/v1beta1",
        rolebindings
    );
}

/// Every row that a `ResourceRouter` is populated with by default
pub fn default_types() -> Vec<&'static K8sType> {
    vec![
        oapi::v1::Project,
        oapi::v1::ProjectRequest,
        oapi::v1::RoleBinding,
        oapi::v1::BuildConfig,
        oapi::v1::DeploymentConfig,
        oapi::v1::ImageStream,
        oapi::v1::ImageStreamTag,
        oapi::v1::Route,
        oapi::v1::Template,
        oapi::v1::ClusterNetwork,
        oapi::v1::NetNamespace,
        kube::v1::Namespace,
        kube::v1::ServiceAccount,
        kube::v1::Secret,
        kube::v1::ConfigMap,
        kube::v1::Service,
        kube::v1::PersistentVolumeClaim,
        kube::v1::ResourceQuota,
        kube::v1::LimitRange,
        rbac::RoleBinding,
    ]
}
