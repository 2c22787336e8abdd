//! Connection settings for the `HttpProvider`.
//!
//! A `ClientConfig` can be created from the service account of a pod running inside the cluster,
//! from a kubeconfig file, or directly from the endpoint and token of a management system.
pub mod kubeconfig;

use std::fmt::{self, Debug};
use std::fs;
use std::io;
use std::path::Path;

pub use self::kubeconfig::{KubeConfig, KubeConfigError};

const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const API_SERVER_HOSTNAME: &str = "kubernetes.default.svc";

/// Certificate authority used to verify the api server
#[derive(Clone, PartialEq)]
pub enum CAData {
    /// base64 encoded PEM, as found inline in kubeconfig files
    Contents(String),
    /// path to a PEM file
    File(String),
}

impl Debug for CAData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CAData::Contents(_) => f.write_str("CAData::Contents(..)"),
            CAData::File(path) => write!(f, "CAData::File({:?})", path),
        }
    }
}

/// How requests authenticate with the api server
#[derive(Clone, PartialEq)]
pub enum Credentials {
    /// The complete value of the `Authorization` header
    Header(String),
    /// Client certificate and key, as paths to PEM files
    PemPath {
        certificate_path: String,
        private_key_path: String,
    },
    /// Client certificate and key, as base64 encoded PEM
    Pem {
        certificate_base64: String,
        private_key_base64: String,
    },
}

impl Credentials {
    pub fn bearer_token(token: &str) -> Credentials {
        Credentials::Header(format!("Bearer {}", token.trim()))
    }

    pub fn basic(username: &str, password: &str) -> Credentials {
        let encoded = base64::encode(format!("{}:{}", username, password));
        Credentials::Header(format!("Basic {}", encoded))
    }

    /// Value for the `Authorization` header, if these credentials use one
    pub fn header_value(&self) -> Option<&str> {
        match self {
            Credentials::Header(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

// never print secrets
impl Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Credentials::Header(_) => f.write_str("Credentials::Header(..)"),
            Credentials::PemPath { certificate_path, .. } => {
                write!(f, "Credentials::PemPath {{ certificate_path: {:?}, .. }}", certificate_path)
            }
            Credentials::Pem { .. } => f.write_str("Credentials::Pem(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_server_endpoint: String,
    pub credentials: Credentials,
    pub ca_data: Option<CAData>,
    pub verify_ssl_certs: bool,
    pub user_agent: String,
    pub impersonate: Option<String>,
    pub impersonate_groups: Vec<String>,
}

impl ClientConfig {
    /// Uses the token and CA that Kubernetes mounts into every pod. Fails if the token isn't there,
    /// which is the case when running outside of a cluster.
    pub fn from_service_account(user_agent: impl Into<String>) -> Result<ClientConfig, io::Error> {
        let token = fs::read_to_string(SERVICE_ACCOUNT_TOKEN_PATH)?;
        let ca_data = if Path::new(SERVICE_ACCOUNT_CA_PATH).exists() {
            Some(CAData::File(SERVICE_ACCOUNT_CA_PATH.to_owned()))
        } else {
            None
        };

        Ok(ClientConfig {
            api_server_endpoint: format!("https://{}", API_SERVER_HOSTNAME),
            credentials: Credentials::bearer_token(&token),
            ca_data,
            verify_ssl_certs: true,
            user_agent: user_agent.into(),
            impersonate: None,
            impersonate_groups: Vec::new(),
        })
    }

    /// Loads the current context of the kubeconfig file, from `KUBECONFIG` or `~/.kube/config`
    pub fn from_kubeconfig(user_agent: impl Into<String>) -> Result<ClientConfig, KubeConfigError> {
        kubeconfig::load_from_kubeconfig(user_agent.into())
    }

    /// Tries the service account first and falls back to the kubeconfig file
    pub fn from_environment(user_agent: impl Into<String>) -> Result<ClientConfig, KubeConfigError> {
        let user_agent = user_agent.into();
        ClientConfig::from_service_account(user_agent.as_str()).or_else(|err| {
            log::debug!("Failed to load ClientConfig from service account: {}, so trying to load from kubeconfig", err);
            ClientConfig::from_kubeconfig(user_agent)
        })
    }

    /// Connects to the endpoint of a management system, authenticating with a bearer token
    pub fn for_endpoint(
        user_agent: impl Into<String>,
        hostname: &str,
        port: u16,
        token: &str,
        verify_ssl_certs: bool,
    ) -> ClientConfig {
        ClientConfig {
            api_server_endpoint: format!("https://{}:{}", hostname, port),
            credentials: Credentials::bearer_token(token),
            ca_data: None,
            verify_ssl_certs,
            user_agent: user_agent.into(),
            impersonate: None,
            impersonate_groups: Vec::new(),
        }
    }

    pub fn with_ca_file(mut self, path: impl Into<String>) -> Self {
        self.ca_data = Some(CAData::File(path.into()));
        self
    }

    pub fn impersonate(mut self, user: impl Into<String>, groups: Vec<String>) -> Self {
        self.impersonate = Some(user.into());
        self.impersonate_groups = groups;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn endpoint_config_uses_bearer_token() {
        let conf = ClientConfig::for_endpoint("container-sync", "host.example.com", 8443, "theToken\n", false);
        assert_eq!("https://host.example.com:8443", conf.api_server_endpoint);
        assert_eq!(Some("Bearer theToken"), conf.credentials.header_value());
        assert!(!conf.verify_ssl_certs);
    }

    #[test]
    fn basic_credentials_are_base64_encoded() {
        let creds = Credentials::basic("admin", "secret");
        assert_eq!(Some("Basic YWRtaW46c2VjcmV0"), creds.header_value());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::bearer_token("theToken");
        assert!(!format!("{:?}", creds).contains("theToken"));
    }
}
