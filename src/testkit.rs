//! Test support: an in-process fake of the OpenShift api server.
//!
//! `FakeApiServer` keeps resources in memory, keyed by their url path, and answers the way a
//! real api server does for the handful of things this crate relies on. POST to a collection
//! creates (409 if the name is taken), GET/PUT/PATCH/DELETE work on named paths, PUT checks and
//! bumps `metadata.resourceVersion`, and GET on a collection lists the objects directly under it.
//! Every request is recorded so tests can assert on exactly what was sent.
//!
//! ```no_run
//! use subatomic_openshift::testkit::{run, FakeApiServer};
//!
//! run(async {
//!     let server = FakeApiServer::start().await.unwrap();
//!     let api = server.api();
//!     let response = api.get("Project", "missing", "", "v1").await.unwrap();
//!     assert_eq!(404, response.status);
//! });
//! ```
use crate::api::OpenShiftApi;
use crate::config::ClientConfig;
use crate::resource::{JsonObject, RESOURCE_VERSION_KEY, UID_KEY};

use hyper::header::{self, HeaderValue};
use hyper::server::Server;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, StatusCode};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// The only token the fake server accepts
pub const FAKE_TOKEN: &str = "fake-token";

/// Runs the future to completion on a fresh single threaded runtime
pub fn run<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create test runtime");
    runtime.block_on(future)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub authorization: Option<String>,
    /// The parsed json body, `Null` when there was none
    pub body: Value,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, Value>,
    requests: Vec<RecordedRequest>,
    failures: HashMap<(String, String), u16>,
    uid_counter: u64,
}

impl State {
    fn next_uid(&mut self) -> String {
        self.uid_counter += 1;
        format!("uid-{}", self.uid_counter)
    }
}

#[derive(Debug)]
pub struct FakeApiServer {
    address: SocketAddr,
    state: Arc<Mutex<State>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for FakeApiServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl FakeApiServer {
    /// Binds to a random local port and starts serving on the current tokio runtime
    pub async fn start() -> Result<FakeApiServer, hyper::Error> {
        let state = Arc::new(Mutex::new(State::default()));
        let address: SocketAddr = ([127, 0, 0, 1], 0).into();

        let service_state = state.clone();
        let make_service = make_service_fn(move |_| {
            let state = service_state.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request| {
                    handle_request(state.clone(), request)
                }))
            }
        });
        let server = Server::try_bind(&address)?.serve(make_service);
        let address = server.local_addr();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        tokio::spawn(async move {
            if let Err(err) = server.await {
                log::error!("Fake api server failed: {}", err);
            }
        });
        log::debug!("Started fake api server on {}", address);

        Ok(FakeApiServer {
            address,
            state,
            shutdown: Some(shutdown),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.url(), FAKE_TOKEN)
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(5))
    }

    /// A client for this server, with the default router and policies
    pub fn api(&self) -> OpenShiftApi {
        OpenShiftApi::new(self.client_config()).expect("failed to create client for fake api server")
    }

    /// Stores an object at the given path, as if it had been created earlier. `uid` and
    /// `resourceVersion` are assigned unless the object already has them.
    pub fn insert(&self, path: &str, object: Value) {
        let path = normalize(path);
        let mut state = self.state();
        let uid = state.next_uid();
        let mut object = object;
        if let Some(metadata) = metadata_mut(&mut object) {
            metadata
                .entry(UID_KEY)
                .or_insert_with(|| Value::String(uid));
            metadata
                .entry(RESOURCE_VERSION_KEY)
                .or_insert_with(|| Value::String("1".to_owned()));
            if let Some(namespace) = ApiPath::parse(&path).and_then(|p| p.namespace) {
                metadata
                    .entry("namespace")
                    .or_insert_with(|| Value::String(namespace));
            }
        }
        state.objects.insert(path, object);
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.state().objects.get(&normalize(path)).cloned()
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state().requests.last().cloned()
    }

    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    /// Makes every `method` request to exactly `path` fail with `status`
    pub fn fail(&self, method: &str, path: &str, status: u16) {
        self.state()
            .failures
            .insert((method.to_uppercase(), normalize(path)), status);
    }

    fn state(&self) -> MutexGuard<State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A request path split into its api prefix and the resource part. An odd number of resource
/// segments is a collection (`namespaces/a/routes`), an even number a named resource.
#[derive(Debug)]
struct ApiPath {
    collection: String,
    name: Option<String>,
    namespace: Option<String>,
}

impl ApiPath {
    fn parse(path: &str) -> Option<ApiPath> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let prefix_len = match segments.first() {
            Some(&"oapi") | Some(&"api") => 2,
            Some(&"apis") => 3,
            _ => return None,
        };
        if segments.len() <= prefix_len {
            return None;
        }
        let resource = &segments[prefix_len..];
        let namespace = if resource.len() >= 3 && resource[0] == "namespaces" {
            Some(resource[1].to_owned())
        } else {
            None
        };
        if resource.len() % 2 == 1 {
            Some(ApiPath {
                collection: format!("/{}", segments.join("/")),
                name: None,
                namespace,
            })
        } else {
            let (name, parent) = segments.split_last()?;
            Some(ApiPath {
                collection: format!("/{}", parent.join("/")),
                name: Some((*name).to_owned()),
                namespace,
            })
        }
    }
}

fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn metadata_mut(object: &mut Value) -> Option<&mut JsonObject> {
    let object = object.as_object_mut()?;
    object
        .entry("metadata")
        .or_insert_with(|| Value::Object(JsonObject::new()))
        .as_object_mut()
}

fn resource_version(object: &Value) -> Option<&str> {
    object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

async fn handle_request(
    state: Arc<Mutex<State>>,
    request: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let (parts, body) = request.into_parts();
    let head = Request::from_parts(parts, ());
    let body = match hyper::body::to_bytes(body).await {
        Ok(bytes) => parse_body(bytes.as_ref()),
        Err(err) => {
            return Ok(status_response(400, format!("failed to read body: {}", err)));
        }
    };
    let recorded = RecordedRequest {
        method: head.method().to_string(),
        path: normalize(head.uri().path()),
        content_type: header_string(&head, header::CONTENT_TYPE),
        authorization: header_string(&head, header::AUTHORIZATION),
        body,
    };
    log::debug!("Fake api server got {} {}", recorded.method, recorded.path);

    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.requests.push(recorded.clone());
    Ok(respond(&mut state, recorded))
}

fn header_string(request: &Request<()>, name: header::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn respond(state: &mut State, request: RecordedRequest) -> Response<Body> {
    let expected_auth = format!("bearer {}", FAKE_TOKEN);
    if request.authorization.as_deref() != Some(expected_auth.as_str()) {
        return status_response(401, "missing or invalid bearer token".to_owned());
    }
    let failure = state
        .failures
        .get(&(request.method.clone(), request.path.clone()))
        .copied();
    if let Some(status) = failure {
        return status_response(status, format!("injected failure for {}", request.path));
    }
    let path = match ApiPath::parse(&request.path) {
        Some(path) => path,
        None => return status_response(404, format!("no api at {}", request.path)),
    };

    match (request.method.as_str(), path.name.as_ref()) {
        ("GET", None) => list(state, &path),
        ("POST", None) => create(state, &path, request.body),
        ("GET", Some(_)) => match state.objects.get(&request.path) {
            Some(object) => json_response(200, object.clone()),
            None => not_found(&request.path),
        },
        ("PUT", Some(_)) => replace(state, &request.path, request.body),
        ("PATCH", Some(_)) => patch(state, &request.path, &request.body),
        ("DELETE", Some(_)) => match state.objects.remove(&request.path) {
            Some(_) => json_response(
                200,
                json!({"kind": "Status", "apiVersion": "v1", "metadata": {}, "status": "Success"}),
            ),
            None => not_found(&request.path),
        },
        _ => status_response(
            405,
            format!("{} is not allowed on {}", request.method, request.path),
        ),
    }
}

fn list(state: &State, path: &ApiPath) -> Response<Body> {
    let prefix = format!("{}/", path.collection);
    let items: Vec<Value> = state
        .objects
        .iter()
        .filter(|(key, _)| {
            key.strip_prefix(prefix.as_str())
                .map(|name| !name.contains('/'))
                .unwrap_or(false)
        })
        .map(|(_, object)| {
            let mut item = object.clone();
            if let Some(map) = item.as_object_mut() {
                map.remove("kind");
                map.remove("apiVersion");
            }
            item
        })
        .collect();
    json_response(
        200,
        json!({"kind": "List", "apiVersion": "v1", "metadata": {}, "items": items}),
    )
}

fn create(state: &mut State, path: &ApiPath, mut object: Value) -> Response<Body> {
    let name = match object.pointer("/metadata/name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => return status_response(422, "metadata.name is required".to_owned()),
    };
    let key = format!("{}/{}", path.collection, name);
    if state.objects.contains_key(&key) {
        return status_response(409, format!("'{}' already exists", name));
    }
    let uid = state.next_uid();
    if let Some(metadata) = metadata_mut(&mut object) {
        metadata.insert(UID_KEY.to_owned(), Value::String(uid));
        metadata.insert(RESOURCE_VERSION_KEY.to_owned(), Value::String("1".to_owned()));
        if let Some(namespace) = path.namespace.as_ref() {
            metadata
                .entry("namespace")
                .or_insert_with(|| Value::String(namespace.clone()));
        }
    }
    state.objects.insert(key, object.clone());
    json_response(201, object)
}

fn replace(state: &mut State, key: &str, mut object: Value) -> Response<Body> {
    let existing = match state.objects.get(key) {
        Some(existing) => existing,
        None => return not_found(key),
    };
    let current_version = resource_version(existing).unwrap_or("0").to_owned();
    if let Some(version) = resource_version(&object) {
        if version != current_version {
            return status_response(
                409,
                format!(
                    "resourceVersion {} does not match current version {}",
                    version, current_version
                ),
            );
        }
    }
    let uid = existing.pointer("/metadata/uid").cloned();
    if let Some(metadata) = metadata_mut(&mut object) {
        if let Some(uid) = uid {
            metadata.insert(UID_KEY.to_owned(), uid);
        }
        metadata.insert(
            RESOURCE_VERSION_KEY.to_owned(),
            Value::String(next_version(&current_version)),
        );
    }
    state.objects.insert(key.to_owned(), object.clone());
    json_response(200, object)
}

fn patch(state: &mut State, key: &str, changes: &Value) -> Response<Body> {
    let object = match state.objects.get_mut(key) {
        Some(object) => object,
        None => return not_found(key),
    };
    merge(object, changes);
    let version = next_version(resource_version(object).unwrap_or("0"));
    if let Some(metadata) = metadata_mut(object) {
        metadata.insert(RESOURCE_VERSION_KEY.to_owned(), Value::String(version));
    }
    json_response(200, object.clone())
}

fn next_version(version: &str) -> String {
    version
        .parse::<u64>()
        .map(|v| v + 1)
        .unwrap_or(1)
        .to_string()
}

/// Recursive object merge, where a `null` in the patch removes the key
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                } else {
                    merge(target.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        400 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        405 => "MethodNotAllowed",
        409 => "Conflict",
        422 => "Invalid",
        500 => "InternalError",
        503 => "ServiceUnavailable",
        _ => "Unknown",
    }
}

fn not_found(path: &str) -> Response<Body> {
    status_response(404, format!("{} not found", path))
}

fn status_response(status: u16, message: String) -> Response<Body> {
    json_response(
        status,
        json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason(status),
            "code": status,
        }),
    )
}

fn json_response(status: u16, body: Value) -> Response<Body> {
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn paths_are_split_into_collection_and_name() {
        let named = ApiPath::parse("/api/v1/namespaces/a/secrets/b").unwrap();
        assert_eq!("/api/v1/namespaces/a/secrets", named.collection);
        assert_eq!(Some("b".to_owned()), named.name);
        assert_eq!(Some("a".to_owned()), named.namespace);

        let collection = ApiPath::parse("/apis/rbac.authorization.k8s.io/v1beta1/namespaces/a/rolebindings").unwrap();
        assert_eq!(None, collection.name);
        assert_eq!(Some("a".to_owned()), collection.namespace);

        let cluster_scoped = ApiPath::parse("/oapi/v1/netnamespaces/a").unwrap();
        assert_eq!("/oapi/v1/netnamespaces", cluster_scoped.collection);
        assert_eq!(None, cluster_scoped.namespace);

        assert!(ApiPath::parse("/healthz").is_none());
        assert!(ApiPath::parse("/oapi/v1").is_none());
    }

    #[test]
    fn merge_replaces_leaves_and_removes_nulls() {
        let mut target = json!({"spec": {"a": 1, "b": {"c": 2}}, "keep": true});
        merge(&mut target, &json!({"spec": {"a": null, "b": {"d": 3}}}));
        assert_eq!(json!({"spec": {"b": {"c": 2, "d": 3}}, "keep": true}), target);
    }

    #[test]
    fn requests_without_the_token_are_unauthorized() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let api = OpenShiftApi::new(ClientConfig::new(server.url(), "wrong")).unwrap();

            let response = api.get("Project", "p", "", "v1").await.unwrap();

            assert_eq!(401, response.status);
            assert_eq!(Some("bearer wrong".to_owned()), server.last_request().unwrap().authorization);
        });
    }

    #[test]
    fn put_with_stale_resource_version_conflicts() {
        run(async {
            let server = FakeApiServer::start().await.unwrap();
            let path = "/api/v1/namespaces/a/configmaps/settings";
            server.insert(
                path,
                json!({"kind": "ConfigMap", "metadata": {"name": "settings", "resourceVersion": "4"}}),
            );
            let api = server.api();
            let url = url::Url::parse(&format!("{}{}", server.url(), path)).unwrap();
            let stale = json!({"kind": "ConfigMap", "metadata": {"name": "settings", "resourceVersion": "3"}});

            let response = api.client().put(url, &stale).await.unwrap();

            assert_eq!(409, response.status);
            assert_eq!(Some(&json!("4")), server.object(path).unwrap().pointer("/metadata/resourceVersion"));
        });
    }
}
