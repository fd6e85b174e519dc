//! Configuration for connecting to a single OpenShift cluster.
//!
//! A `ClusterConnection` is just the master url and a bearer token. `ClientConfig` wraps it
//! together with the transport settings. Configs are plain values that get passed into
//! `OpenShiftApi::new`, so tests can create any number of independent clients.
pub mod kubeconfig;

pub use self::kubeconfig::{KubeConfig, KubeConfigError};

use anyhow::Context;

use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "subatomic-openshift";
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(45);

pub const MASTER_URL_ENV_VAR: &str = "OPENSHIFT_MASTER_URL";
pub const TOKEN_ENV_VAR: &str = "OPENSHIFT_TOKEN";
pub const VERIFY_SSL_ENV_VAR: &str = "OPENSHIFT_VERIFY_SSL";
pub const TIMEOUT_ENV_VAR: &str = "OPENSHIFT_TIMEOUT_SECS";

const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const API_SERVER_HOSTNAME: &str = "kubernetes.default.svc";

/// The master url and bearer token for a cluster. Immutable once a client has been created.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConnection {
    pub master_url: String,
    pub token: String,
}

impl ClusterConnection {
    pub fn new(master_url: impl Into<String>, token: impl Into<String>) -> ClusterConnection {
        ClusterConnection {
            master_url: master_url.into(),
            token: token.into(),
        }
    }

    /// The value of the `Authorization` header that's sent with every request
    pub fn authorization_header(&self) -> String {
        format!("bearer {}", self.token.trim())
    }

    pub(crate) fn master_url_trimmed(&self) -> &str {
        self.master_url.trim_end_matches('/')
    }
}

/// Certificate authority used to verify the api server, when verification is enabled.
#[derive(Debug, Clone, PartialEq)]
pub enum CAData {
    File(String),
    /// base64 encoded PEM, as found in a kubeconfig `certificate-authority-data` entry
    Contents(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub connection: ClusterConnection,
    pub user_agent: String,

    /// Clusters are commonly running with self-signed certificates, so this is `false` unless
    /// explicitly turned on.
    pub verify_ssl_certs: bool,
    pub ca_data: Option<CAData>,

    /// Applied to GET requests
    pub read_timeout: Duration,
    /// Applied to POST, PUT, PATCH, and DELETE requests
    pub write_timeout: Duration,
}

impl ClientConfig {
    pub fn new(master_url: impl Into<String>, token: impl Into<String>) -> ClientConfig {
        ClientConfig::from_connection(ClusterConnection::new(master_url, token))
    }

    pub fn from_connection(connection: ClusterConnection) -> ClientConfig {
        ClientConfig {
            connection,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            verify_ssl_certs: false,
            ca_data: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Turns on verification of the api server certificate, optionally against a specific CA
    pub fn verify_ssl_certs(mut self, ca_data: Option<CAData>) -> Self {
        self.verify_ssl_certs = true;
        self.ca_data = ca_data;
        self
    }

    pub fn with_timeouts(mut self, read_timeout: Duration, write_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }

    /// Reads the connection from the `OPENSHIFT_MASTER_URL` and `OPENSHIFT_TOKEN` environment
    /// variables. `OPENSHIFT_VERIFY_SSL=true` turns on certificate verification and
    /// `OPENSHIFT_TIMEOUT_SECS` overrides both timeouts.
    pub fn from_env() -> Result<ClientConfig, anyhow::Error> {
        let master_url = std::env::var(MASTER_URL_ENV_VAR)
            .with_context(|| format!("{} is not set", MASTER_URL_ENV_VAR))?;
        let token = std::env::var(TOKEN_ENV_VAR)
            .with_context(|| format!("{} is not set", TOKEN_ENV_VAR))?;
        let mut config = ClientConfig::new(master_url, token);

        if let Ok(verify) = std::env::var(VERIFY_SSL_ENV_VAR) {
            if verify.eq_ignore_ascii_case("true") {
                config = config.verify_ssl_certs(None);
            }
        }
        if let Ok(secs) = std::env::var(TIMEOUT_ENV_VAR) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("invalid value for {}: '{}'", TIMEOUT_ENV_VAR, secs))?;
            let timeout = Duration::from_secs(secs);
            config = config.with_timeouts(timeout, timeout);
        }
        Ok(config)
    }

    /// Builds a config from the service account that's mounted into every pod
    pub fn from_service_account() -> Result<ClientConfig, anyhow::Error> {
        let token = std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN_PATH).with_context(|| {
            format!(
                "failed to read service account token from '{}'",
                SERVICE_ACCOUNT_TOKEN_PATH
            )
        })?;
        let master_url = format!("https://{}", API_SERVER_HOSTNAME);
        let mut config = ClientConfig::new(master_url, token.trim());
        if std::path::Path::new(SERVICE_ACCOUNT_CA_PATH).exists() {
            config.ca_data = Some(CAData::File(SERVICE_ACCOUNT_CA_PATH.to_owned()));
        }
        Ok(config)
    }

    /// Loads the current context from the kubeconfig file, using `KUBECONFIG` or `~/.kube/config`
    pub fn from_kubeconfig() -> Result<ClientConfig, KubeConfigError> {
        kubeconfig::load_from_kubeconfig()
    }

    /// Tries the environment first, then the in-cluster service account, then the kubeconfig
    pub fn load() -> Result<ClientConfig, anyhow::Error> {
        ClientConfig::from_env()
            .or_else(|err| {
                log::debug!("No cluster connection in environment ({}), trying service account", err);
                ClientConfig::from_service_account()
            })
            .or_else(|err| {
                log::debug!("Failed to load service account ({}), trying kubeconfig", err);
                ClientConfig::from_kubeconfig().map_err(anyhow::Error::from)
            })
            .context("unable to determine a cluster connection")
    }
}
