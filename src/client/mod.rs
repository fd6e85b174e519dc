//! The http transport for a single cluster. A `Client` is cheap to clone and can be shared by
//! any number of concurrent callers, since the only state it holds is the immutable config.
pub mod metrics;
pub mod request;

use crate::config::{CAData, ClientConfig};
use crate::error::Error;
use crate::resource::ApiResponse;

pub use self::metrics::{ClientMetrics, Metrics};
pub use self::request::MergeStrategy;

use bytes::Bytes;
use http::{Method, Request, Response};
use hyper::client::Client as HyperClient;
use hyper::client::HttpConnector;
use hyper::Body;
use hyper_openssl::HttpsConnector;
use openssl::ssl::{SslConnector, SslMethod};
use openssl::x509::X509;
use serde_json::Value;
use url::Url;

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct ClientInner {
    http_client: HyperClient<HttpsConnector<HttpConnector>>,
    config: ClientConfig,
    metrics: ClientMetrics,
}

#[derive(Debug, Clone)]
pub struct Client(Arc<ClientInner>);

impl Client {
    pub fn new(config: ClientConfig, metrics: ClientMetrics) -> Result<Client, io::Error> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);

        let mut ssl = SslConnector::builder(SslMethod::tls())?;
        // enable http2 using alpn
        ssl.set_alpn_protos(b"\x02h2\x08http/1.1")?;
        match config.ca_data.as_ref() {
            Some(CAData::Contents(certs)) => {
                // if the CA cert contents are provided inline, as they are from a kubeconfig file, then we need to manually
                // parse them and add them to the openssl cert store
                let decoded = base64::decode(certs).map_err(|err| {
                    io::Error::new(
                        io::ErrorKind::Other,
                        format!(
                            "Invalid base64 content of certificate-authority-data: {}",
                            err
                        ),
                    )
                })?;
                let certs = X509::stack_from_pem(decoded.as_slice())?;
                let cert_store = ssl.cert_store_mut();
                for cert in certs {
                    cert_store.add_cert(cert)?;
                }
            }
            Some(CAData::File(path)) => {
                ssl.set_ca_file(path.as_str())?;
            }
            None => {}
        }

        if config.verify_ssl_certs {
            ssl.set_verify(openssl::ssl::SslVerifyMode::PEER);
        } else {
            log::warn!("TLS Certificate verification has been disabled for {}! All connections to the OpenShift master will be insecure!", config.connection.master_url);
            ssl.set_verify(openssl::ssl::SslVerifyMode::NONE);
        }

        let https = HttpsConnector::with_connector(http, ssl)?;
        let client = HyperClient::builder().build(https);

        let inner = ClientInner {
            http_client: client,
            config,
            metrics,
        };
        Ok(Client(Arc::new(inner)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.0.config
    }

    pub async fn get(&self, url: Url) -> Result<ApiResponse, Error> {
        let req = request::get_request(&self.0.config, url)?;
        self.execute(req).await
    }

    pub async fn post(&self, url: Url, body: &Value) -> Result<ApiResponse, Error> {
        let req = request::create_request(&self.0.config, url, body)?;
        self.execute(req).await
    }

    pub async fn put(&self, url: Url, body: &Value) -> Result<ApiResponse, Error> {
        let req = request::replace_request(&self.0.config, url, body)?;
        self.execute(req).await
    }

    pub async fn patch(
        &self,
        url: Url,
        body: &Value,
        merge_strategy: MergeStrategy,
    ) -> Result<ApiResponse, Error> {
        let req = request::patch_request(&self.0.config, url, body, merge_strategy)?;
        self.execute(req).await
    }

    pub async fn delete(&self, url: Url) -> Result<ApiResponse, Error> {
        let req = request::delete_request(&self.0.config, url)?;
        self.execute(req).await
    }

    /// Sends the request and reads the whole response. Any status code is returned as an
    /// `ApiResponse`; only failing to get a response at all is an error.
    pub async fn execute(&self, req: Request<Body>) -> Result<ApiResponse, Error> {
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let timeout = self.timeout_for(req.method());
        let start_time = Instant::now();

        let read = async {
            let response = self
                .private_execute_request(start_time, method.as_str(), uri.as_str(), req)
                .await?;
            Client::read_body(response).await
        };

        let result = match tokio::time::timeout(timeout, read).await {
            Ok(result) => result,
            Err(_) => {
                log::error!(
                    "{} request to: {} timed out after {}ms",
                    method,
                    uri,
                    timeout.as_millis()
                );
                self.0.metrics.transport_error();
                Err(Error::Timeout {
                    method: method.clone(),
                    uri: uri.clone(),
                    after: timeout,
                })
            }
        };

        if let Ok(ref response) = result {
            log::debug!(
                "Finished {} request to: {}, status: {}, total_duration: {}ms",
                method,
                uri,
                response.status,
                start_time.elapsed().as_millis()
            );
        }
        result
    }

    fn timeout_for(&self, method: &Method) -> Duration {
        if *method == Method::GET {
            self.0.config.read_timeout
        } else {
            self.0.config.write_timeout
        }
    }

    async fn private_execute_request(
        &self,
        start_time: Instant,
        method: &str,
        uri: &str,
        req: Request<Body>,
    ) -> Result<Response<Body>, Error> {
        log::debug!("Starting {} request to: {}", method, uri);
        let timer = self.0.metrics.request_started();
        let result = self.0.http_client.request(req).await;
        let duration = start_time.elapsed().as_millis();
        timer.observe_duration();
        match result {
            Ok(resp) => {
                let status_code = resp.status().as_u16();
                self.0.metrics.response_received(status_code);
                log::debug!(
                    "Response status received for {} to: {}, status: {}, duration: {}ms",
                    method,
                    uri,
                    status_code,
                    duration
                );
                Ok(resp)
            }
            Err(err) => {
                self.0.metrics.transport_error();
                log::error!(
                    "Failed to execute {} request to: {}, err: {}",
                    method,
                    uri,
                    err
                );
                Err(err.into())
            }
        }
    }

    async fn read_body(response: Response<Body>) -> Result<ApiResponse, Error> {
        let status = response.status().as_u16();
        let body = hyper::body::to_bytes(response.into_body()).await?;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Got response body: {}", String::from_utf8_lossy(body.as_ref()));
        }
        Ok(ApiResponse::new(status, parse_body(&body)))
    }
}

/// Response bodies are json almost always. An empty body becomes `null`, and anything that
/// isn't json (a proxy error page, for instance) is kept as a string.
fn parse_body(body: &Bytes) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body.as_ref())
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body.as_ref()).into_owned()))
}
