//! Maps a resource's kind and apiVersion to the api family and url path it is served under.
//!
//! Routing is table driven. The router is populated from `k8s_types::default_types()` when it is
//! constructed, and more rows can be registered with `with_route`. A kind that has no row for
//! the requested apiVersion falls back to the legacy api with a lower-cased kind plus "s". That
//! fallback is wrong for irregular plurals (a `Policy` would become `policys`), so such kinds need
//! a row of their own.
use crate::config::ClusterConnection;
use crate::error::Error;
use crate::k8s_types::{self, ApiFamily, K8sType};
use crate::resource::ResourceEnvelope;

use url::Url;

use std::collections::HashMap;

/// The api family and collection path segment for a `(kind, apiVersion)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub family: ApiFamily,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Route {
    api_version: String,
    path: String,
    family: ApiFamily,
}

#[derive(Debug, Clone)]
pub struct ResourceRouter {
    routes: HashMap<String, Vec<Route>>,
}

impl Default for ResourceRouter {
    fn default() -> Self {
        ResourceRouter::new()
    }
}

impl ResourceRouter {
    pub fn new() -> ResourceRouter {
        k8s_types::default_types()
            .into_iter()
            .fold(ResourceRouter::empty(), |router, k8s_type| {
                router.with_route(k8s_type)
            })
    }

    /// A router without any rows, so everything is routed by the fallback rule
    pub fn empty() -> ResourceRouter {
        ResourceRouter {
            routes: HashMap::new(),
        }
    }

    pub fn with_route(self, k8s_type: &K8sType) -> Self {
        self.with_route_parts(
            k8s_type.kind,
            k8s_type.api_version,
            k8s_type.plural_kind,
            k8s_type.family,
        )
    }

    /// Registers a row for a kind that is only known at runtime. A later row for the same
    /// kind and apiVersion replaces the earlier one.
    pub fn with_route_parts(
        mut self,
        kind: &str,
        api_version: &str,
        path: &str,
        family: ApiFamily,
    ) -> Self {
        let routes = self
            .routes
            .entry(kind.to_lowercase())
            .or_insert_with(Vec::new);
        routes.retain(|r| r.api_version != api_version);
        routes.push(Route {
            api_version: api_version.to_owned(),
            path: path.to_owned(),
            family,
        });
        self
    }

    pub fn resolve(&self, kind: &str, api_version: &str) -> RoutingDecision {
        let kind = kind.to_lowercase();
        let found = self
            .routes
            .get(&kind)
            .and_then(|routes| routes.iter().find(|r| r.api_version == api_version));
        match found {
            Some(route) => RoutingDecision {
                family: route.family,
                path: route.path.clone(),
            },
            None => {
                log::trace!(
                    "No route registered for kind: '{}', apiVersion: '{}', using default",
                    kind,
                    api_version
                );
                RoutingDecision {
                    family: ApiFamily::Oapi,
                    path: format!("{}s", kind),
                }
            }
        }
    }

    /// The collection path for the resource's kind, relative to the api base url
    pub fn kind_url(&self, resource: &ResourceEnvelope, namespace: &str) -> String {
        let decision = self.resolve(&resource.kind, &resource.api_version);
        if namespace.is_empty() {
            decision.path
        } else {
            format!("namespaces/{}/{}", namespace, decision.path)
        }
    }

    /// The path of the named resource, relative to the api base url
    pub fn named_url(&self, resource: &ResourceEnvelope, namespace: &str) -> Result<String, Error> {
        let name = resource.require_name()?;
        Ok(format!("{}/{}", self.kind_url(resource, namespace), name))
    }

    /// The base url for the family that serves this resource
    pub fn base_url(
        &self,
        connection: &ClusterConnection,
        resource: &ResourceEnvelope,
    ) -> Result<Url, Error> {
        let decision = self.resolve(&resource.kind, &resource.api_version);
        base_url(connection, decision.family, &resource.api_version)
    }

    /// The absolute url for a path returned by `kind_url` or `named_url`
    pub fn absolute_url(
        &self,
        connection: &ClusterConnection,
        resource: &ResourceEnvelope,
        relative_path: &str,
    ) -> Result<Url, Error> {
        let mut url = self.base_url(connection, resource)?;
        push_segments(&mut url, relative_path)?;
        Ok(url)
    }
}

/// `{master}/oapi/{apiVersion}` for the legacy family, `{master}/api/v1` or
/// `{master}/apis/{apiVersion}` for the kubernetes family.
pub fn base_url(
    connection: &ClusterConnection,
    family: ApiFamily,
    api_version: &str,
) -> Result<Url, Error> {
    let prefix = match family {
        ApiFamily::Oapi => "oapi",
        ApiFamily::Api if api_version == "v1" => "api",
        ApiFamily::Api => "apis",
    };
    let mut url = Url::parse(connection.master_url_trimmed())?;
    push_segments(&mut url, prefix)?;
    push_segments(&mut url, api_version)?;
    Ok(url)
}

fn push_segments(url: &mut Url, path: &str) -> Result<(), Error> {
    let mut segments = url
        .path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
    segments.pop_if_empty();
    segments.extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(())
}
