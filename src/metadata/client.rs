use super::{InstanceIdentityDocument, MetadataError, MetadataProvider};
use crate::credentials::{CredentialSource, Credentials};
use crate::environment::EnvironmentSource;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";

const TOKEN_PATH: &str = "/latest/api/token";
const REGION_PATH: &str = "/latest/meta-data/placement/region";
const INSTANCE_ID_PATH: &str = "/latest/meta-data/instance-id";
const IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";
const SECURITY_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

const TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";

#[derive(Debug, Clone)]
pub struct MetadataClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub token_ttl: Duration,
    pub disabled: bool,
}

impl Default for MetadataClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(1),
            token_ttl: Duration::from_secs(21600),
            disabled: false,
        }
    }
}

impl MetadataClientConfig {
    /// Applies the SDK-standard `AWS_EC2_METADATA_*` overrides.
    pub fn from_environment(env: &impl EnvironmentSource) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = env.var("AWS_EC2_METADATA_SERVICE_ENDPOINT")
            && !endpoint.is_empty()
        {
            config.endpoint = endpoint;
        }
        config.disabled = env
            .var("AWS_EC2_METADATA_DISABLED")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
struct SessionToken {
    value: String,
    expires_at: Instant,
}

/// Instance metadata service client.
///
/// Requests use an IMDSv2 session token when the service hands one out and
/// fall back to plain IMDSv1 requests otherwise.
#[derive(Debug)]
pub struct Ec2MetadataClient {
    client: Client,
    base_url: Url,
    config: MetadataClientConfig,
    token: Mutex<Option<SessionToken>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleCredentialsResponse {
    code: String,
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

impl Ec2MetadataClient {
    pub fn new(config: MetadataClientConfig) -> Result<Self, MetadataError> {
        let base_url = Url::parse(&config.endpoint).map_err(|e| {
            MetadataError::InvalidEndpoint(format!("'{}': {}", config.endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            base_url,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.base_url.as_str()
    }

    fn url(&self, path: &str) -> Result<Url, MetadataError> {
        self.base_url
            .join(path)
            .map_err(|e| MetadataError::InvalidEndpoint(format!("'{path}': {e}")))
    }

    async fn session_token(&self) -> Option<String> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|token| token.expires_at > Instant::now())
            .map(|token| token.value.clone());
        if cached.is_some() {
            return cached;
        }

        let url = self.url(TOKEN_PATH).ok()?;
        let response = self
            .client
            .put(url)
            .header(TOKEN_TTL_HEADER, self.config.token_ttl.as_secs().to_string())
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(
                    status = response.status().as_u16(),
                    "Metadata token request rejected, using IMDSv1"
                );
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Metadata token request failed, using IMDSv1");
                return None;
            }
        };

        let value = response.text().await.ok()?;
        // Refresh a minute early so a token never expires mid-request.
        let lifetime = self
            .config
            .token_ttl
            .saturating_sub(Duration::from_secs(60));
        *self.token.lock() = Some(SessionToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Some(value)
    }

    async fn get(&self, path: &str) -> Result<String, MetadataError> {
        if self.config.disabled {
            return Err(MetadataError::Disabled);
        }

        let url = self.url(path)?;
        let token = self.session_token().await;
        let mut response = self.send_get(url.clone(), token.as_deref()).await?;

        // The service revokes tokens on its own schedule; a 401 means ours is stale.
        if response.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            debug!(path, "Metadata token rejected, requesting a new one");
            *self.token.lock() = None;
            let token = self.session_token().await;
            response = self.send_get(url, token.as_deref()).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    async fn send_get(&self, url: Url, token: Option<&str>) -> Result<Response, reqwest::Error> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        request.send().await
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, MetadataError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.get(path).await?;
        serde_json::from_str(&body).map_err(|e| MetadataError::Malformed {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn non_empty(&self, path: &str) -> Result<String, MetadataError> {
        let value = self.get(path).await?.trim().to_string();
        if value.is_empty() {
            return Err(MetadataError::Malformed {
                path: path.to_string(),
                message: "empty response".to_string(),
            });
        }
        Ok(value)
    }
}

impl MetadataProvider for Ec2MetadataClient {
    async fn region(&self) -> Result<String, MetadataError> {
        self.non_empty(REGION_PATH).await
    }

    async fn instance_id(&self) -> Result<String, MetadataError> {
        self.non_empty(INSTANCE_ID_PATH).await
    }

    async fn identity_document(&self) -> Result<InstanceIdentityDocument, MetadataError> {
        self.get_json(IDENTITY_DOCUMENT_PATH).await
    }

    async fn role_credentials(&self) -> Result<Credentials, MetadataError> {
        let listing = self.get(SECURITY_CREDENTIALS_PATH).await?;
        let role = listing
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| MetadataError::Unavailable("no IAM role attached".to_string()))?
            .to_string();

        let path = format!("{SECURITY_CREDENTIALS_PATH}{role}");
        let response: RoleCredentialsResponse = self.get_json(&path).await?;
        if response.code != "Success" {
            return Err(MetadataError::Unavailable(format!(
                "role '{role}' credentials returned code {}",
                response.code
            )));
        }

        Ok(Credentials {
            access_key_id: response.access_key_id,
            secret_access_key: response.secret_access_key,
            session_token: response.token.filter(|token| !token.is_empty()),
            expires_at: response.expiration,
            source: CredentialSource::InstanceRole,
        })
    }
}
