//! Reads the cluster address and bearer token of the current context from the file `oc login`
//! writes. Contexts that authenticate any other way are rejected.
use super::{CAData, ClientConfig, ClusterConnection};

use dirs::home_dir;

use std::fmt::{self, Display};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum KubeConfigError {
    /// The file could not be opened or read
    Read(io::Error),
    /// The file is not yaml, or is missing `current-context`, `clusters`, `users` or `contexts`
    Parse(serde_yaml::Error),
    /// `KUBECONFIG` is unset and there is no home directory to look in
    NoPath,
    /// The current context names a context, cluster or user that is not in the file
    UnknownEntry { section: &'static str, name: String },
    /// The user of the current context has no `token`
    MissingCredentials,
}

impl From<serde_yaml::Error> for KubeConfigError {
    fn from(err: serde_yaml::Error) -> KubeConfigError {
        KubeConfigError::Parse(err)
    }
}

impl From<io::Error> for KubeConfigError {
    fn from(err: io::Error) -> KubeConfigError {
        KubeConfigError::Read(err)
    }
}

impl Display for KubeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KubeConfigError::Read(err) => write!(f, "could not read kubeconfig: {}", err),
            KubeConfigError::Parse(err) => write!(f, "could not parse kubeconfig: {}", err),
            KubeConfigError::NoPath => f.write_str(
                "KUBECONFIG is not set and there is no home directory to find .kube/config in",
            ),
            KubeConfigError::UnknownEntry { section, name } => {
                write!(f, "kubeconfig has no entry '{}' under {}", name, section)
            }
            KubeConfigError::MissingCredentials => f.write_str(
                "the current kubeconfig context has no token, run `oc login` to get one",
            ),
        }
    }
}

impl std::error::Error for KubeConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KubeConfigError::Read(err) => Some(err),
            KubeConfigError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// `$KUBECONFIG` when set, `~/.kube/config` otherwise. Only a single path is supported, not a
/// list of files to merge.
fn kubeconfig_path() -> Result<PathBuf, KubeConfigError> {
    if let Some(path) = std::env::var_os("KUBECONFIG") {
        return Ok(PathBuf::from(path));
    }
    home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or(KubeConfigError::NoPath)
}

pub fn load_kubeconfig(file_path: impl AsRef<Path>) -> Result<ClientConfig, KubeConfigError> {
    let file_path = file_path.as_ref();
    let kubeconfig = KubeConfig::load_file(file_path)?;
    // a relative certificate-authority is relative to the kubeconfig itself
    let base_dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    kubeconfig.create_client_config(base_dir)
}

pub fn load_from_kubeconfig() -> Result<ClientConfig, KubeConfigError> {
    let path = kubeconfig_path()?;
    log::debug!("Loading kubeconfig from '{}'", path.display());
    load_kubeconfig(path)
}

// Only the fields needed for a token login are read, everything else in the file is ignored.

#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "kebab-case")]
struct ClusterEntry {
    server: String,
    certificate_authority_data: Option<String>,
    certificate_authority: Option<PathBuf>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct UserEntry {
    token: Option<String>,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct ContextEntry {
    cluster: String,
    user: String,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct NamedUser {
    name: String,
    user: UserEntry,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    current_context: String,
    clusters: Vec<NamedCluster>,
    users: Vec<NamedUser>,
    contexts: Vec<NamedContext>,
}

fn lookup<'a, T>(
    entries: &'a [T],
    section: &'static str,
    name: &str,
    entry_name: impl Fn(&T) -> &str,
) -> Result<&'a T, KubeConfigError> {
    entries
        .iter()
        .find(|entry| entry_name(entry) == name)
        .ok_or_else(|| KubeConfigError::UnknownEntry {
            section,
            name: name.to_owned(),
        })
}

impl KubeConfig {
    pub fn load_file(path: &Path) -> Result<KubeConfig, KubeConfigError> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Builds a token authenticated config for `current-context`. A certificate authority in the
    /// cluster entry turns on certificate verification unless `insecure-skip-tls-verify` is set.
    pub fn create_client_config(&self, base_dir: &Path) -> Result<ClientConfig, KubeConfigError> {
        let context = lookup(&self.contexts, "contexts", &self.current_context, |c| {
            c.name.as_str()
        })?;
        let cluster = lookup(&self.clusters, "clusters", &context.context.cluster, |c| {
            c.name.as_str()
        })?;
        let user = lookup(&self.users, "users", &context.context.user, |u| u.name.as_str())?;

        let token = user
            .user
            .token
            .as_deref()
            .ok_or(KubeConfigError::MissingCredentials)?;
        log::debug!(
            "Using the token of user '{}' for cluster '{}'",
            user.name,
            cluster.cluster.server
        );
        let connection = ClusterConnection::new(cluster.cluster.server.as_str(), token);
        let config = ClientConfig::from_connection(connection);

        let entry = &cluster.cluster;
        let ca_data = match (&entry.certificate_authority_data, &entry.certificate_authority) {
            (Some(contents), _) => Some(CAData::Contents(contents.clone())),
            (None, Some(path)) => {
                let resolved = base_dir.join(path).to_string_lossy().into_owned();
                log::debug!("Using certificate-authority file '{}'", resolved);
                Some(CAData::File(resolved))
            }
            (None, None) => None,
        };
        if ca_data.is_none() || entry.insecure_skip_tls_verify {
            return Ok(config);
        }
        Ok(config.verify_ssl_certs(ca_data))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn loads_token_and_server_from_current_context() {
        let file = "src/config/test-data/kubeconfig-with-token.yaml";
        let loaded = load_kubeconfig(file).expect("failed to load kubeconfig");
        assert_eq!("https://openshift.dev.local:8443", loaded.connection.master_url);
        assert_eq!("dev-token", loaded.connection.token);
        assert!(!loaded.verify_ssl_certs);
        assert_eq!(None, loaded.ca_data);
    }

    #[test]
    fn resolves_relative_ca_file_and_enables_verification() {
        let file = "src/config/test-data/kubeconfig-with-ca-file.yaml";
        let loaded = load_kubeconfig(file).expect("failed to load kubeconfig");
        let expected = CAData::File("src/config/test-data/./dummy-ca.crt".to_string());
        assert_eq!(Some(expected), loaded.ca_data);
        assert!(loaded.verify_ssl_certs);
    }

    #[test]
    fn context_without_token_is_rejected() {
        let file = "src/config/test-data/kubeconfig-without-token.yaml";
        let result = load_kubeconfig(file);
        match result {
            Err(KubeConfigError::MissingCredentials) => {}
            other => panic!("expected MissingCredentials, got: {:?}", other),
        }
    }

    #[test]
    fn unknown_current_context_names_the_missing_entry() {
        let kubeconfig: KubeConfig = serde_yaml::from_str(
            "current-context: gone\nclusters: []\nusers: []\ncontexts: []\n",
        )
        .unwrap();

        let err = kubeconfig.create_client_config(Path::new(".")).unwrap_err();

        assert_eq!("kubeconfig has no entry 'gone' under contexts", err.to_string());
    }
}
