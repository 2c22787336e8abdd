//! A `ProviderConnection` that talks to a Kubernetes or OpenShift api server over https.
//!
//! Requests are made with hyper on a single threaded tokio runtime owned by the provider, and each
//! call blocks until the response body has been read. Don't use it from inside of another runtime.
mod request;

use crate::config::{CAData, ClientConfig, Credentials};
use crate::error::BoxError;
use crate::operation::Operation;
use crate::provider::discovery::{self, ApiResource, ApiResourceList, DiscoveredResources};
use crate::provider::metrics::Metrics;
use crate::provider::{ApiError, ApiResponse, CallError, ClientHandle, ProviderConnection, RawResponse};

use bytes::Bytes;
use http::{Request, StatusCode};
use hyper::client::Client as HyperClient;
use hyper::client::HttpConnector;
use hyper::Body;
use hyper_openssl::HttpsConnector;
use openssl::pkey::PKey;
use openssl::ssl::{SslConnector, SslConnectorBuilder, SslMethod};
use openssl::x509::X509;
use serde_json::Value;
use tokio::runtime::{self, Runtime};

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::fs;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub use self::request::MergeStrategy;

#[derive(Debug)]
pub enum HttpError {
    Io(io::Error),
    Tls(openssl::error::ErrorStack),
    Hyper(hyper::Error),
    Serde(serde_json::Error),
    Request(http::Error),
    Url(url::ParseError),
    InvalidEndpoint(String),
    Metrics(prometheus::Error),
    UnknownKind { kind: String, api_version: String },
    MissingName,
}

impl Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            HttpError::Io(ref e) => write!(f, "Io Error: {}", e),
            HttpError::Tls(ref e) => write!(f, "TLS Error: {}", e),
            HttpError::Hyper(ref e) => write!(f, "Http Error: {}", e),
            HttpError::Serde(ref e) => write!(f, "(De)Serialization error: {}", e),
            HttpError::Request(ref e) => write!(f, "Invalid request: {}", e),
            HttpError::Url(ref e) => write!(f, "Invalid api server endpoint: {}", e),
            HttpError::InvalidEndpoint(ref endpoint) => write!(f, "Api server endpoint cannot be used as a base url: '{}'", endpoint),
            HttpError::Metrics(ref e) => write!(f, "Failed to register metrics: {}", e),
            HttpError::UnknownKind { ref kind, ref api_version } => {
                write!(f, "The server doesn't have a resource of kind '{}' in apiVersion: '{}'", kind, api_version)
            }
            HttpError::MissingName => f.write_str("Resource has no metadata.name"),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpError::Io(e) => Some(e as &(dyn std::error::Error + 'static)),
            HttpError::Tls(e) => Some(e as &(dyn std::error::Error + 'static)),
            HttpError::Hyper(e) => Some(e as &(dyn std::error::Error + 'static)),
            HttpError::Serde(e) => Some(e as &(dyn std::error::Error + 'static)),
            HttpError::Request(e) => Some(e as &(dyn std::error::Error + 'static)),
            HttpError::Url(e) => Some(e as &(dyn std::error::Error + 'static)),
            HttpError::Metrics(e) => Some(e as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> HttpError {
        HttpError::Io(e)
    }
}
impl From<openssl::error::ErrorStack> for HttpError {
    fn from(e: openssl::error::ErrorStack) -> HttpError {
        HttpError::Tls(e)
    }
}
impl From<hyper::Error> for HttpError {
    fn from(e: hyper::Error) -> HttpError {
        HttpError::Hyper(e)
    }
}
impl From<serde_json::Error> for HttpError {
    fn from(e: serde_json::Error) -> HttpError {
        HttpError::Serde(e)
    }
}
impl From<http::Error> for HttpError {
    fn from(e: http::Error) -> HttpError {
        HttpError::Request(e)
    }
}
impl From<prometheus::Error> for HttpError {
    fn from(e: prometheus::Error) -> HttpError {
        HttpError::Metrics(e)
    }
}

impl From<HttpError> for CallError {
    fn from(e: HttpError) -> CallError {
        CallError::Transport(Box::new(e))
    }
}

struct ProviderInner {
    http_client: HyperClient<HttpsConnector<HttpConnector>>,
    config: ClientConfig,
    runtime: Runtime,
    metrics: Metrics,
    discovered: Mutex<HashMap<String, Arc<DiscoveredResources>>>,
}

impl Debug for ProviderInner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_server_endpoint", &self.config.api_server_endpoint)
            .finish()
    }
}

/// Connection to a single api server. Cloning is cheap, and clones share the connection pool,
/// the runtime, and the discovered api resources.
#[derive(Debug, Clone)]
pub struct HttpProvider(Arc<ProviderInner>);

impl HttpProvider {
    pub fn new(config: ClientConfig) -> Result<HttpProvider, HttpError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);

        let mut ssl = SslConnector::builder(SslMethod::tls())?;
        // enable http2 using alpn
        ssl.set_alpn_protos(b"\x02h2\x08http/1.1")?;
        match config.ca_data.as_ref() {
            Some(CAData::Contents(certs)) => {
                let decoded = decode_base64("certificate-authority-data", certs)?;
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

        match config.credentials {
            Credentials::PemPath {
                ref certificate_path,
                ref private_key_path,
            } => {
                let cert = fs::read(certificate_path)?;
                let key = fs::read(private_key_path)?;
                set_client_certificate(&mut ssl, &cert, &key)?;
            }
            Credentials::Pem {
                ref certificate_base64,
                ref private_key_base64,
            } => {
                let cert = decode_base64("client-certificate-data", certificate_base64)?;
                let key = decode_base64("client-key-data", private_key_base64)?;
                set_client_certificate(&mut ssl, &cert, &key)?;
            }
            Credentials::Header(_) => {}
        }

        if config.verify_ssl_certs {
            ssl.set_verify(openssl::ssl::SslVerifyMode::PEER);
        } else {
            log::warn!("TLS Certificate verification has been disabled! All connections to {} will be insecure!", config.api_server_endpoint);
            ssl.set_verify(openssl::ssl::SslVerifyMode::NONE);
        }

        let https = HttpsConnector::with_connector(http, ssl)?;
        let http_client = HyperClient::builder().build(https);
        let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
        let metrics = Metrics::new()?;

        log::info!("Created HttpProvider for api server: {}", config.api_server_endpoint);
        let inner = ProviderInner {
            http_client,
            config,
            runtime,
            metrics,
            discovered: Mutex::new(HashMap::new()),
        };
        Ok(HttpProvider(Arc::new(inner)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.0.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.0.metrics
    }

    fn cached_discovery(&self, api_version: &str) -> Option<Arc<DiscoveredResources>> {
        let cache = self.0.discovered.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(api_version).cloned()
    }
}

impl ProviderConnection for HttpProvider {
    fn connect_client(&self, api_version: &str, operation: &Operation) -> Result<Box<dyn ClientHandle>, BoxError> {
        log::trace!("Connecting client for {} with apiVersion: {}", operation, api_version);
        Ok(Box::new(HttpClientHandle {
            inner: self.0.clone(),
            api_version: api_version.to_owned(),
            resources: self.cached_discovery(api_version),
        }))
    }
}

fn decode_base64(field: &str, data: &str) -> Result<Vec<u8>, io::Error> {
    base64::decode(data).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Invalid base64 content of {}: {}", field, err),
        )
    })
}

fn set_client_certificate(ssl: &mut SslConnectorBuilder, cert: &[u8], key: &[u8]) -> Result<(), HttpError> {
    let cert = X509::from_pem(cert)?;
    let pkey = PKey::private_key_from_pem(key)?;
    ssl.set_certificate(&cert)?;
    ssl.set_private_key(&pkey)?;
    // the key has to belong to the certificate
    ssl.check_private_key()?;
    Ok(())
}

/// A fully read response
struct Response {
    status: StatusCode,
    body: Bytes,
}

impl Response {
    fn into_object(self) -> Result<ApiResponse, CallError> {
        if self.status.is_success() {
            let value = serde_json::from_slice(self.body.as_ref()).map_err(HttpError::from)?;
            Ok(ApiResponse::Object(value))
        } else {
            Err(CallError::Api(self.api_error()))
        }
    }

    /// Decodes the `Status` object from an error response, or makes one up from the status line
    fn api_error(&self) -> ApiError {
        match serde_json::from_slice::<ApiError>(self.body.as_ref()) {
            Ok(mut err) => {
                err.code = self.status.as_u16();
                err
            }
            Err(_) => ApiError::new(
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or(""),
                String::from_utf8_lossy(self.body.as_ref()).trim(),
            ),
        }
    }

    fn into_raw(self) -> RawResponse {
        let description = if self.status.is_success() {
            self.status.canonical_reason().unwrap_or("").to_owned()
        } else {
            self.api_error().message
        };
        RawResponse {
            status: self.status.as_u16(),
            body: self.body,
            description,
        }
    }
}

#[derive(Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<Value>,
}

/// Items of a list response don't carry their own `kind` and `apiVersion`
fn fill_type(items: &mut [Value], kind: &str, api_version: &str) {
    for item in items.iter_mut() {
        if let Some(obj) = item.as_object_mut() {
            obj.entry("kind").or_insert_with(|| Value::String(kind.to_owned()));
            obj.entry("apiVersion").or_insert_with(|| Value::String(api_version.to_owned()));
        }
    }
}

struct HttpClientHandle {
    inner: Arc<ProviderInner>,
    api_version: String,
    resources: Option<Arc<DiscoveredResources>>,
}

impl HttpClientHandle {
    fn resource(&self, kind: &str) -> Result<&ApiResource, HttpError> {
        self.resources
            .as_ref()
            .and_then(|discovered| discovered.get(kind))
            .ok_or_else(|| HttpError::UnknownKind {
                kind: kind.to_owned(),
                api_version: self.api_version.clone(),
            })
    }

    fn execute(&self, req: Request<Body>) -> Result<Response, HttpError> {
        let inner = self.inner.as_ref();
        inner.runtime.block_on(HttpClientHandle::execute_async(inner, req))
    }

    async fn execute_async(inner: &ProviderInner, req: Request<Body>) -> Result<Response, HttpError> {
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let start_time = Instant::now();
        log::debug!("Starting {} request to: {}", method, uri);

        let timer = inner.metrics.request_started();
        let result = inner.http_client.request(req).await;
        timer.observe_duration();
        let response = match result {
            Ok(resp) => resp,
            Err(err) => {
                log::error!("Failed to execute {} request to: {}, err: {}", method, uri, err);
                inner.metrics.call_failed(method.as_str());
                return Err(err.into());
            }
        };

        let status = response.status();
        inner.metrics.call_completed(method.as_str(), status.as_u16());
        let body = hyper::body::to_bytes(response.into_body()).await?;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Got response body: {}", String::from_utf8_lossy(body.as_ref()));
        }
        log::debug!(
            "Finished {} request to: {}, status: {}, total_duration: {}ms",
            method,
            uri,
            status.as_u16(),
            start_time.elapsed().as_millis()
        );
        Ok(Response { status, body })
    }
}

impl ClientHandle for HttpClientHandle {
    fn is_discovered(&self) -> bool {
        self.resources.is_some()
    }

    fn discover(&mut self) -> Result<(), CallError> {
        let req = request::discovery_request(&self.inner.config, &self.api_version)?;
        let response = self.execute(req)?;
        if !response.status.is_success() {
            log::error!(
                "Discovery of {} failed with status: {}",
                discovery::discovery_path(&self.api_version),
                response.status
            );
            return Err(CallError::Api(response.api_error()));
        }
        let list: ApiResourceList = serde_json::from_slice(response.body.as_ref()).map_err(HttpError::from)?;
        let discovered = Arc::new(DiscoveredResources::new(list));
        log::debug!("Discovered {} resources for apiVersion: {}", discovered.len(), self.api_version);

        let mut cache = self.inner.discovered.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.insert(self.api_version.clone(), discovered.clone());
        self.resources = Some(discovered);
        Ok(())
    }

    fn get(&mut self, kind: &str, name: &str, namespace: &str) -> Result<ApiResponse, CallError> {
        let req = request::get_request(&self.inner.config, &self.api_version, self.resource(kind)?, name, namespace)?;
        self.execute(req)?.into_object()
    }

    fn list(&mut self, kind: &str, namespace: &str) -> Result<ApiResponse, CallError> {
        let req = request::list_request(&self.inner.config, &self.api_version, self.resource(kind)?, namespace)?;
        let response = self.execute(req)?;
        if !response.status.is_success() {
            return Err(CallError::Api(response.api_error()));
        }
        let mut list: ObjectList = serde_json::from_slice(response.body.as_ref()).map_err(HttpError::from)?;
        fill_type(&mut list.items, kind, &self.api_version);
        Ok(ApiResponse::List(list.items))
    }

    fn create(&mut self, kind: &str, body: &Value) -> Result<ApiResponse, CallError> {
        let req = request::create_request(&self.inner.config, &self.api_version, self.resource(kind)?, body)?;
        self.execute(req)?.into_object()
    }

    fn patch(&mut self, kind: &str, name: &str, patch: &Value, namespace: &str) -> Result<ApiResponse, CallError> {
        let req = request::patch_request(
            &self.inner.config,
            &self.api_version,
            self.resource(kind)?,
            name,
            namespace,
            patch,
        )?;
        self.execute(req)?.into_object()
    }

    fn update(&mut self, kind: &str, body: &Value) -> Result<ApiResponse, CallError> {
        let req = request::replace_request(&self.inner.config, &self.api_version, self.resource(kind)?, body)?;
        self.execute(req)?.into_object()
    }

    /// The api server answers a delete with either the deleted object or a `Status`, so the
    /// response is passed through as is
    fn delete(&mut self, kind: &str, name: &str, namespace: &str) -> Result<ApiResponse, CallError> {
        let req = request::delete_request(&self.inner.config, &self.api_version, self.resource(kind)?, name, namespace)?;
        Ok(ApiResponse::Raw(self.execute(req)?.into_raw()))
    }
}
