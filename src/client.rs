//! The WeChat Pay v3 HTTP core.
//!
//! [`Client`] signs outgoing requests, verifies inbound responses against
//! the cached platform certificates, refreshes those certificates on
//! demand, and decrypts notification payloads. It is a thread-safe shared
//! object: methods may be called concurrently from any number of tasks,
//! and the certificate cache is the only shared mutable state.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::Sha256;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::bill::FileUrl;
use crate::cert::{CertificateCache, CertificatesResponse};
use crate::notify::Notification;
use crate::result::parse_timestamp;
use crate::sign::{self, aes_gcm, keys, RequestSignature, ResponseSignature};
use crate::{ApiResult, Error, Result};

/// Production API host.
pub const DEFAULT_DOMAIN: &str = "https://api.mch.weixin.qq.com";

/// Authorization scheme label for the v3 protocol.
pub const DEFAULT_SCHEMA: &str = "WECHATPAY2-SHA256-RSA2048";

/// Default certificate cache lifetime.
pub const DEFAULT_CERT_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Merchant credentials. All fields are required.
#[derive(Clone, Debug)]
pub struct Config {
    /// Application id assigned by the platform.
    pub app_id: String,
    /// Merchant id.
    pub mch_id: String,
    /// APIv3 secret, the 32-byte AEAD key for encrypted payloads.
    pub api_secret: String,
    /// Merchant certificate suite.
    pub cert: CertSuite,
}

/// The merchant API certificate: serial plus private key.
#[derive(Clone, Debug)]
pub struct CertSuite {
    /// Hex serial of the merchant certificate.
    pub serial_no: String,
    /// The merchant RSA private key (PKCS#8).
    pub private_key: PrivateKey,
}

/// Where the merchant private key comes from.
#[derive(Clone, Debug)]
pub enum PrivateKey {
    /// PEM text.
    Pem(String),
    /// Path to a PEM file.
    Path(PathBuf),
}

/// Tuning options applied on top of the defaults at construction.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Base URL all endpoint paths are appended to.
    pub domain: String,
    /// Certificate bootstrap URL; requests to exactly this URL trigger
    /// the certificate install hook.
    pub cert_url: String,
    /// Authorization scheme label.
    pub schema: String,
    /// Request timeout; unbounded unless configured.
    pub timeout: Option<Duration>,
    /// How long one certificate fetch keeps the cache fresh.
    pub cert_refresh_interval: Duration,
    /// Injected HTTP client; built from `timeout` when absent.
    pub http_client: Option<reqwest::Client>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            cert_url: format!("{}/v3/certificates", DEFAULT_DOMAIN),
            schema: DEFAULT_SCHEMA.to_string(),
            timeout: None,
            cert_refresh_interval: DEFAULT_CERT_REFRESH_INTERVAL,
            http_client: None,
        }
    }
}

impl ClientOptions {
    /// Point the client at another host; also rebases the certificate
    /// URL. Apply before [`ClientOptions::with_cert_url`] when both are
    /// customized.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self.cert_url = format!("{}/v3/certificates", self.domain);
        self
    }

    /// Override the certificate bootstrap URL.
    pub fn with_cert_url(mut self, cert_url: impl Into<String>) -> Self {
        self.cert_url = cert_url.into();
        self
    }

    /// Override the authorization scheme label.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Bound every request by a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Change how long one certificate fetch keeps the cache fresh.
    pub fn with_cert_refresh_interval(mut self, interval: Duration) -> Self {
        self.cert_refresh_interval = interval;
        self
    }

    /// Inject a pre-built HTTP client (connection pool, proxy, TLS
    /// settings). Takes precedence over `timeout`.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

/// WeChat Pay client for API v3.
#[derive(Debug)]
pub struct Client {
    config: Config,
    options: ClientOptions,
    signing_key: SigningKey<Sha256>,
    secret: Zeroizing<Vec<u8>>,
    certificates: CertificateCache,
    http: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl Client {
    /// Create a client with default options.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_options(config, ClientOptions::default())
    }

    /// Create a client, validating the configuration and loading the
    /// merchant private key.
    pub fn with_options(config: Config, options: ClientOptions) -> Result<Self> {
        if config.app_id.is_empty() {
            return Err(Error::invalid_config("app_id is required"));
        }
        if config.mch_id.is_empty() {
            return Err(Error::invalid_config("mch_id is required"));
        }
        if config.api_secret.is_empty() {
            return Err(Error::invalid_config("api_secret is required"));
        }
        if config.api_secret.len() != 32 {
            return Err(Error::invalid_config(format!(
                "api_secret must be 32 bytes, got {}",
                config.api_secret.len()
            )));
        }
        if config.cert.serial_no.is_empty() {
            return Err(Error::invalid_config("cert.serial_no is required"));
        }

        let private_key = match &config.cert.private_key {
            PrivateKey::Pem(pem) => keys::private_key_from_pem(pem)?,
            PrivateKey::Path(path) => keys::private_key_from_file(path)?,
        };

        let http = match &options.http_client {
            Some(client) => client.clone(),
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(timeout) = options.timeout {
                    builder = builder.timeout(timeout);
                }
                builder
                    .build()
                    .map_err(|e| Error::internal(format!("cannot build http client: {}", e)))?
            }
        };

        let secret = Zeroizing::new(config.api_secret.as_bytes().to_vec());

        Ok(Self {
            config,
            options,
            signing_key: SigningKey::new(private_key),
            secret,
            certificates: CertificateCache::new(),
            http,
        })
    }

    /// The merchant configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The resolved client options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    #[cfg(test)]
    pub(crate) fn certificates(&self) -> &CertificateCache {
        &self.certificates
    }

    /// Compute the `Authorization` header value for a request signature:
    /// the scheme label, a space, and the signed key-value pairs.
    pub fn signature(&self, req_sign: &RequestSignature) -> Result<String> {
        let pairs = sign::generate_authorization(
            &self.signing_key,
            req_sign,
            &self.config.mch_id,
            &self.config.cert.serial_no,
        )?;
        Ok(format!("{} {}", self.options.schema, pairs))
    }

    /// Serialize, sign, send, verify. The returned carrier holds either
    /// the verified response or the first error the pipeline hit.
    ///
    /// A `GET` ignores the request value; any other method serializes it
    /// as the JSON body when present.
    pub async fn execute<T>(&self, method: Method, url: &str, req: Option<&T>) -> ApiResult
    where
        T: Serialize + ?Sized + Sync,
    {
        self.execute_guarded(method, url, req, true).await
    }

    /// The re-entrancy guard: the certificate sub-fetch runs with
    /// `allow_refresh` cleared so a refresh can never trigger another
    /// refresh.
    ///
    /// Returns a boxed future (rather than being declared `async fn`) so
    /// the recursive edge through `refresh_certificates` has a concrete,
    /// explicitly `Send` type to close over instead of an unresolvable
    /// self-referential `Send` cycle.
    fn execute_guarded<'a, T>(
        &'a self,
        method: Method,
        url: &'a str,
        req: Option<&'a T>,
        allow_refresh: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ApiResult> + Send + 'a>>
    where
        T: Serialize + ?Sized + Sync,
    {
        Box::pin(async move {
            let is_cert_request = method == Method::GET && url == self.options.cert_url;

            let body = match req {
                Some(value) if method != Method::GET => match serde_json::to_vec(value) {
                    Ok(body) => body,
                    Err(e) => return ApiResult::from_error(e.into()),
                },
                _ => Vec::new(),
            };

            let req_sign = RequestSignature::new(method.as_str(), url, body);
            debug!(method = %req_sign.method, url = %req_sign.url, "sending signed request");

            let mut result = self.send(method, &req_sign).await;
            if result.err.is_some() {
                return result;
            }

            // Install before verification: for a certificate fetch, the keys
            // delivered in this very response are the ones that verify it.
            if is_cert_request {
                if let Err(err) = self.install_certificates(&result.body) {
                    return ApiResult::from_error(err);
                }
            }

            let allow = allow_refresh && !is_cert_request;
            if let Err(err) = self.verify_guarded(&result, allow).await {
                warn!(serial = %result.serial_no, error = %err, "response verification failed");
                result.err = Some(err);
            }

            result
        })
    }

    async fn send(&self, method: Method, req_sign: &RequestSignature) -> ApiResult {
        let auth = match self.signature(req_sign) {
            Ok(auth) => auth,
            Err(e) => return ApiResult::from_error(e),
        };

        let mut builder = self
            .http
            .request(method, &req_sign.url)
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if !req_sign.body.is_empty() {
            builder = builder.body(req_sign.body.clone());
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => return ApiResult::from_error(e.into()),
        };

        let status = resp.status().as_u16();
        if status >= 300 {
            let body = match resp.bytes().await {
                Ok(body) => body,
                Err(e) => return ApiResult::from_error(e.into()),
            };
            return ApiResult::from_error(error_from_status(status, &body));
        }

        let nonce = header_str(resp.headers(), "Wechatpay-Nonce");
        let signature = header_str(resp.headers(), "Wechatpay-Signature");
        let serial_no = header_str(resp.headers(), "Wechatpay-Serial");
        let timestamp = match parse_timestamp(&header_str(resp.headers(), "Wechatpay-Timestamp")) {
            Ok(timestamp) => timestamp,
            Err(e) => return ApiResult::from_error(e),
        };

        let body = match resp.bytes().await {
            Ok(body) => body.to_vec(),
            Err(e) => return ApiResult::from_error(e.into()),
        };

        ApiResult {
            body,
            timestamp,
            nonce,
            signature,
            serial_no,
            err: None,
        }
    }

    /// Verify a carrier against the cached platform certificates,
    /// refreshing the cache first when it is empty or past its deadline.
    pub async fn verify(&self, result: &ApiResult) -> Result<()> {
        self.verify_guarded(result, true).await
    }

    async fn verify_guarded(&self, result: &ApiResult, allow_refresh: bool) -> Result<()> {
        if allow_refresh && self.certificates.is_stale() {
            self.refresh_certificates().await?;
        }

        let key = self
            .certificates
            .get(&result.serial_no)
            .ok_or_else(|| Error::UnknownSerial(result.serial_no.clone()))?;

        let resp_sign = ResponseSignature {
            timestamp: result.timestamp,
            nonce: &result.nonce,
            body: &result.body,
        };
        sign::verify_response(&key, &resp_sign, &result.signature)
    }

    async fn refresh_certificates(&self) -> Result<()> {
        debug!(url = %self.options.cert_url, "refreshing platform certificates");

        // This is the one recursive edge in the pipeline
        // (execute -> verify -> refresh -> execute); execute_guarded
        // already returns a boxed future, so no extra boxing is needed here.
        let result = self
            .execute_guarded::<()>(Method::GET, &self.options.cert_url, None, false)
            .await;
        result.error()?;

        if self.certificates.is_empty() {
            return Err(Error::internal("no platform certificates are available"));
        }
        Ok(())
    }

    fn install_certificates(&self, body: &[u8]) -> Result<()> {
        let resp: CertificatesResponse = serde_json::from_slice(body)?;
        for cert in &resp.certificates {
            let key = cert.decrypt(&self.secret)?;
            self.certificates
                .add(&cert.serial_no, key, self.options.cert_refresh_interval)?;
        }
        debug!(count = resp.certificates.len(), "installed platform certificates");
        Ok(())
    }

    /// Verify and decrypt a server-push notification.
    ///
    /// Returns the parsed envelope and the decrypted resource plaintext;
    /// the caller unmarshals the plaintext into its concrete event type.
    pub async fn parse_notification(&self, result: &ApiResult) -> Result<(Notification, Vec<u8>)> {
        let notification: Notification = serde_json::from_slice(&result.body)?;

        self.verify_guarded(result, true).await?;

        let resource = &notification.resource;
        if resource.algorithm != aes_gcm::ALGORITHM_AES_256_GCM {
            return Err(Error::invalid_input(
                "resource.algorithm",
                format!("unsupported algorithm {:?}", resource.algorithm),
            ));
        }

        let plaintext = aes_gcm::decrypt(
            &self.secret,
            resource.nonce.as_bytes(),
            resource.associated_data.as_bytes(),
            &resource.ciphertext,
        )?;

        Ok((notification, plaintext))
    }

    /// Signed GET for a bill file. The response is a raw byte stream:
    /// file downloads carry no signature headers, so none are verified;
    /// the descriptor's hash fields are the caller's integrity handle.
    pub async fn download(&self, file_url: &FileUrl) -> Result<Vec<u8>> {
        let req_sign = RequestSignature::new("GET", &file_url.download_url, Vec::new());
        let auth = self.signature(&req_sign)?;

        let resp = self
            .http
            .get(&file_url.download_url)
            .header(AUTHORIZATION, auth)
            .header(ACCEPT, "*/*")
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        if status >= 300 {
            return Err(error_from_status(status, &body));
        }

        Ok(body.to_vec())
    }
}

fn header_str(headers: &reqwest::header::HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn error_from_status(status: u16, body: &[u8]) -> Error {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => Error::Http {
            status,
            code: parsed.code,
            message: parsed.message,
        },
        Err(e) => Error::Internal(format!(
            "undecodable error response (status {}): {}",
            status, e
        )),
    }
}
