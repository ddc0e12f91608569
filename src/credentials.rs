//! Lazy AWS credential resolution.
//!
//! `Config` carries a [`CredentialsChain`], never plaintext secrets. The
//! delivery client asks the chain for credentials when it signs a request;
//! the chain walks its sources in order and caches the first success until
//! it is about to expire.

use crate::environment::EnvironmentSource;
use crate::metadata::MetadataProvider;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`).
    Environment,
    /// IAM role attached to the EC2 instance, served by the metadata service.
    InstanceRole,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => f.write_str("environment"),
            CredentialSource::InstanceRole => f.write_str("instance-role"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// `None` for static credentials.
    pub expires_at: Option<DateTime<Utc>>,
    pub source: CredentialSource,
}

impl Credentials {
    pub fn expires_within(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - window <= now)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub source: CredentialSource,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("No valid credential source in chain: {}", describe_failures(.0))]
    NoValidProvider(Vec<LinkFailure>),
}

fn describe_failures(failures: &[LinkFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.source, failure.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Ordered credential sources with a shared cache.
///
/// Clones share the cache, so every holder of the same `Config` sees one
/// refresh rather than one per clone.
#[derive(Debug, Clone)]
pub struct CredentialsChain {
    sources: Vec<CredentialSource>,
    expiry_window: TimeDelta,
    cached: Arc<Mutex<Option<Credentials>>>,
}

impl CredentialsChain {
    pub fn new(sources: Vec<CredentialSource>) -> Self {
        Self {
            sources,
            expiry_window: TimeDelta::seconds(10),
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Environment variables first, then the instance role.
    pub fn env_then_instance_role() -> Self {
        Self::new(vec![
            CredentialSource::Environment,
            CredentialSource::InstanceRole,
        ])
    }

    pub fn with_expiry_window(mut self, window: TimeDelta) -> Self {
        self.expiry_window = window;
        self
    }

    pub fn sources(&self) -> &[CredentialSource] {
        &self.sources
    }

    /// Drops cached credentials so the next call walks the chain again,
    /// e.g. after the service rejected a signature.
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    pub fn is_cached(&self) -> bool {
        self.cached.lock().is_some()
    }

    pub async fn credentials(
        &self,
        env: &impl EnvironmentSource,
        metadata: &impl MetadataProvider,
    ) -> Result<Credentials, CredentialsError> {
        let cached = self.cached_valid(Utc::now());
        if let Some(credentials) = cached {
            return Ok(credentials);
        }

        let mut failures = Vec::with_capacity(self.sources.len());
        for source in self.sources.iter().copied() {
            let attempt = match source {
                CredentialSource::Environment => from_environment(env),
                CredentialSource::InstanceRole => metadata
                    .role_credentials()
                    .await
                    .map_err(|e| e.to_string()),
            };

            match attempt {
                Ok(credentials) => {
                    debug!(%source, expires_at = ?credentials.expires_at, "Resolved AWS credentials");
                    *self.cached.lock() = Some(credentials.clone());
                    return Ok(credentials);
                }
                Err(reason) => {
                    debug!(%source, %reason, "Credential source unavailable");
                    failures.push(LinkFailure { source, reason });
                }
            }
        }

        Err(CredentialsError::NoValidProvider(failures))
    }

    fn cached_valid(&self, now: DateTime<Utc>) -> Option<Credentials> {
        self.cached
            .lock()
            .as_ref()
            .filter(|credentials| !credentials.expires_within(now, self.expiry_window))
            .cloned()
    }
}

fn from_environment(env: &impl EnvironmentSource) -> Result<Credentials, String> {
    let non_empty = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| env.var(name).filter(|value| !value.is_empty()))
    };

    let access_key_id = non_empty(&["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"])
        .ok_or_else(|| "AWS_ACCESS_KEY_ID or AWS_ACCESS_KEY not found".to_string())?;
    let secret_access_key = non_empty(&["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"])
        .ok_or_else(|| "AWS_SECRET_ACCESS_KEY or AWS_SECRET_KEY not found".to_string())?;

    Ok(Credentials {
        access_key_id,
        secret_access_key,
        session_token: non_empty(&["AWS_SESSION_TOKEN"]),
        expires_at: None,
        source: CredentialSource::Environment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{InstanceIdentityDocument, MetadataError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RoleOnlyMetadata {
        expires_at: Option<DateTime<Utc>>,
        calls: AtomicUsize,
    }

    impl RoleOnlyMetadata {
        fn new(expires_at: Option<DateTime<Utc>>) -> Self {
            Self {
                expires_at,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MetadataProvider for RoleOnlyMetadata {
        async fn region(&self) -> Result<String, MetadataError> {
            Err(MetadataError::Disabled)
        }

        async fn instance_id(&self) -> Result<String, MetadataError> {
            Err(MetadataError::Disabled)
        }

        async fn identity_document(&self) -> Result<InstanceIdentityDocument, MetadataError> {
            Err(MetadataError::Disabled)
        }

        async fn role_credentials(&self) -> Result<Credentials, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credentials {
                access_key_id: "ASIAROLE".to_string(),
                secret_access_key: "role-secret".to_string(),
                session_token: Some("role-token".to_string()),
                expires_at: self.expires_at,
                source: CredentialSource::InstanceRole,
            })
        }
    }

    #[test]
    fn test_environment_credentials_take_precedence() {
        let env = [
            "AWS_ACCESS_KEY_ID=AKIAENV",
            "AWS_SECRET_ACCESS_KEY=env-secret",
            "AWS_SESSION_TOKEN=env-token",
        ];
        let metadata = RoleOnlyMetadata::new(None);
        let chain = CredentialsChain::env_then_instance_role();

        let credentials = tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap();

        assert_eq!(credentials.source, CredentialSource::Environment);
        assert_eq!(credentials.access_key_id, "AKIAENV");
        assert_eq!(credentials.session_token.as_deref(), Some("env-token"));
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_legacy_environment_names_accepted() {
        let env = ["AWS_ACCESS_KEY=AKIALEGACY", "AWS_SECRET_KEY=legacy-secret"];
        let credentials = from_environment(&env).unwrap();

        assert_eq!(credentials.access_key_id, "AKIALEGACY");
        assert_eq!(credentials.secret_access_key, "legacy-secret");
        assert_eq!(credentials.session_token, None);
    }

    #[test]
    fn test_falls_back_to_instance_role_and_caches() {
        let env = ["AWS_ACCESS_KEY_ID=AKIAONLYHALF"];
        let metadata = RoleOnlyMetadata::new(Some(Utc::now() + TimeDelta::hours(6)));
        let chain = CredentialsChain::env_then_instance_role();

        let first = tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap();
        let second = tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap();

        assert_eq!(first.source, CredentialSource::InstanceRole);
        assert_eq!(first, second);
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 1);
        assert!(chain.is_cached());
    }

    #[test]
    fn test_expiring_credentials_are_refreshed() {
        let env: [&str; 0] = [];
        let metadata = RoleOnlyMetadata::new(Some(Utc::now() + TimeDelta::seconds(5)));
        let chain = CredentialsChain::env_then_instance_role();

        tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap();
        tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap();

        assert_eq!(metadata.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_refresh() {
        let env: [&str; 0] = [];
        let metadata = RoleOnlyMetadata::new(None);
        let chain = CredentialsChain::env_then_instance_role();
        let shared = chain.clone();

        tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap();
        shared.invalidate();
        assert!(!chain.is_cached());

        tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap();
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_every_link_failure_is_reported() {
        let env: [&str; 0] = [];
        let metadata = RoleOnlyMetadata::new(None);
        let chain = CredentialsChain::new(vec![CredentialSource::Environment]);

        let err = tokio_test::block_on(chain.credentials(&env, &metadata)).unwrap_err();
        let CredentialsError::NoValidProvider(failures) = &err;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, CredentialSource::Environment);
        assert!(err.to_string().contains("environment: AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "super-secret".to_string(),
            session_token: Some("token-value".to_string()),
            expires_at: None,
            source: CredentialSource::Environment,
        };
        let rendered = format!("{credentials:?}");

        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("token-value"));
        assert!(rendered.contains("AKIA"));
    }
}
