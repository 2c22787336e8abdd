use super::{CAData, ClientConfig, Credentials};

use dirs::home_dir;

use std::fmt::{self, Display};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Error loading a kubeconfig file, or creating a `ClientConfig` from it
#[derive(Debug)]
pub enum KubeConfigError {
    Io(io::Error),
    Format(serde_yaml::Error),
    MissingCredentials,
    NoHomeDir,
    InvalidKubeconfig(String),
}

impl From<serde_yaml::Error> for KubeConfigError {
    fn from(err: serde_yaml::Error) -> KubeConfigError {
        KubeConfigError::Format(err)
    }
}

impl From<io::Error> for KubeConfigError {
    fn from(err: io::Error) -> KubeConfigError {
        KubeConfigError::Io(err)
    }
}

impl Display for KubeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            KubeConfigError::Io(ref e) => write!(f, "IO error: {}", e),
            KubeConfigError::Format(ref e) => write!(f, "Kubeconfig format error: {}", e),
            KubeConfigError::MissingCredentials => f.write_str(
                "No supported credentials for the current context. Only token, username/password and client certificates are supported",
            ),
            KubeConfigError::NoHomeDir => f.write_str("Unable to determine HOME directory to load ~/.kube/config"),
            KubeConfigError::InvalidKubeconfig(ref msg) => write!(f, "Invalid kubeconfig file: {}", msg),
        }
    }
}

impl std::error::Error for KubeConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KubeConfigError::Io(e) => Some(e as &(dyn std::error::Error + 'static)),
            KubeConfigError::Format(e) => Some(e as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

/// `KUBECONFIG` if it's set, otherwise `~/.kube/config`
pub fn kubeconfig_path() -> Result<PathBuf, KubeConfigError> {
    if let Some(path) = std::env::var_os("KUBECONFIG") {
        return Ok(PathBuf::from(path));
    }
    let mut home = home_dir().ok_or(KubeConfigError::NoHomeDir)?;
    home.push(".kube/config");
    Ok(home)
}

/// Loads the kubeconfig file at the given path and creates a `ClientConfig` for its current context
pub fn load_kubeconfig(user_agent: String, file_path: impl AsRef<Path>) -> Result<ClientConfig, KubeConfigError> {
    let path = file_path.as_ref();
    let kubeconfig = KubeConfig::load_file(path)?;
    kubeconfig.create_client_config(user_agent, parent_dir(path)?)
}

/// Loads the kubeconfig from `$KUBECONFIG`, or `~/.kube/config` if that isn't set
pub fn load_from_kubeconfig(user_agent: String) -> Result<ClientConfig, KubeConfigError> {
    let (kubeconfig, path) = KubeConfig::load()?;
    log::debug!("Loaded kubeconfig from: {}, current context: {}", path.display(), kubeconfig.current_context());
    kubeconfig.create_client_config(user_agent, parent_dir(&path)?)
}

fn parent_dir(path: &Path) -> Result<&Path, KubeConfigError> {
    path.parent().ok_or_else(|| {
        KubeConfigError::InvalidKubeconfig(format!("cannot determine the directory of '{}'", path.display()))
    })
}

// Only the parts of the kubeconfig format that are needed to connect. These are not complete
// definitions, so they're kept private.

#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "kebab-case")]
struct ClusterInfo {
    server: String,
    certificate_authority_data: Option<String>,
    certificate_authority: Option<PathBuf>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "kebab-case")]
struct UserInfo {
    username: Option<String>,
    password: Option<String>,
    token: Option<String>,
    client_certificate_data: Option<String>,
    client_key_data: Option<String>,
    client_certificate: Option<String>,
    client_key: Option<String>,
    #[serde(rename = "as")]
    as_user: Option<String>,
    #[serde(default)]
    as_groups: Vec<String>,
}

impl UserInfo {
    fn credentials(&self) -> Result<Credentials, KubeConfigError> {
        if let Some(token) = self.token.as_ref() {
            return Ok(Credentials::bearer_token(token));
        }
        if let Some(username) = self.username.as_ref() {
            let password = self
                .password
                .as_ref()
                .ok_or_else(|| invalid("username is specified but not password"))?;
            return Ok(Credentials::basic(username, password));
        }
        if let Some(certificate_path) = self.client_certificate.clone() {
            let private_key_path = self
                .client_key
                .clone()
                .ok_or_else(|| invalid("'client-certificate' is specified, but 'client-key' is missing"))?;
            return Ok(Credentials::PemPath {
                certificate_path,
                private_key_path,
            });
        }
        if let Some(certificate_base64) = self.client_certificate_data.clone() {
            let private_key_base64 = self
                .client_key_data
                .clone()
                .ok_or_else(|| invalid("'client-certificate-data' is specified, but 'client-key-data' is missing"))?;
            return Ok(Credentials::Pem {
                certificate_base64,
                private_key_base64,
            });
        }
        Err(KubeConfigError::MissingCredentials)
    }
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct ContextInfo {
    cluster: String,
    user: String,
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
struct Named<T> {
    name: String,
    #[serde(alias = "cluster", alias = "user", alias = "context")]
    value: T,
}

fn find_named<'a, T>(entries: &'a [Named<T>], what: &str, name: &str) -> Result<&'a T, KubeConfigError> {
    entries
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| &entry.value)
        .ok_or_else(|| invalid(&format!("no {} found with name: '{}'", what, name)))
}

fn invalid(msg: &str) -> KubeConfigError {
    KubeConfigError::InvalidKubeconfig(msg.to_owned())
}

/// A kubeconfig file loaded into memory
#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct KubeConfig {
    #[serde(rename = "current-context")]
    current_context: String,
    clusters: Vec<Named<ClusterInfo>>,
    users: Vec<Named<UserInfo>>,
    contexts: Vec<Named<ContextInfo>>,
}

impl KubeConfig {
    /// Loads the kubeconfig from the usual location, returning the path it was found at as well
    pub fn load() -> Result<(KubeConfig, PathBuf), KubeConfigError> {
        let path = kubeconfig_path()?;
        let conf = KubeConfig::load_file(&path)?;
        Ok((conf, path))
    }

    pub fn load_file(path: &Path) -> Result<KubeConfig, KubeConfigError> {
        let reader = File::open(path)?;
        let conf = serde_yaml::from_reader(reader)?;
        Ok(conf)
    }

    pub fn current_context(&self) -> &str {
        self.current_context.as_str()
    }

    /// Creates a `ClientConfig` for the current context. Relative certificate paths in the file
    /// are resolved against `kubeconfig_dir`.
    pub fn create_client_config(&self, user_agent: String, kubeconfig_dir: &Path) -> Result<ClientConfig, KubeConfigError> {
        let context = find_named(&self.contexts, "context", &self.current_context)?;
        let cluster = find_named(&self.clusters, "cluster", &context.cluster)?;
        let user = find_named(&self.users, "user", &context.user)?;

        let ca_data = match (cluster.certificate_authority_data.as_ref(), cluster.certificate_authority.as_ref()) {
            (Some(contents), _) => Some(CAData::Contents(contents.clone())),
            (None, Some(path)) => {
                let resolved = kubeconfig_dir.join(path).to_string_lossy().into_owned();
                log::debug!("Resolved certificate-authority path '{}' to '{}'", path.display(), resolved);
                Some(CAData::File(resolved))
            }
            (None, None) => None,
        };

        Ok(ClientConfig {
            api_server_endpoint: cluster.server.clone(),
            credentials: user.credentials()?,
            ca_data,
            verify_ssl_certs: !cluster.insecure_skip_tls_verify,
            user_agent,
            impersonate: user.as_user.clone(),
            impersonate_groups: user.as_groups.clone(),
        })
    }
}
