#![allow(dead_code)]

use rask_journal_forwarder::credentials::{CredentialSource, Credentials};
use rask_journal_forwarder::metadata::{InstanceIdentityDocument, MetadataError, MetadataProvider};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory metadata service. `None` fields answer with an error, the way
/// a host off EC2 would.
#[derive(Debug, Default)]
pub struct FakeMetadata {
    pub region: Option<String>,
    pub instance_id: Option<String>,
    pub document: Option<InstanceIdentityDocument>,
    pub role_credentials: Option<Credentials>,
    pub calls: AtomicUsize,
}

impl FakeMetadata {
    /// Not running on EC2: every query fails.
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn on_instance(region: &str, instance_id: &str) -> Self {
        Self {
            region: Some(region.to_string()),
            instance_id: Some(instance_id.to_string()),
            document: Some(InstanceIdentityDocument {
                region: region.to_string(),
                instance_id: instance_id.to_string(),
                availability_zone: format!("{region}a"),
                account_id: "123456789012".to_string(),
                instance_type: "t3.micro".to_string(),
                billing_products: vec!["bp-6ba54002".to_string()],
                ..Default::default()
            }),
            role_credentials: Some(Credentials {
                access_key_id: "ASIAFAKE".to_string(),
                secret_access_key: "fake-secret".to_string(),
                session_token: Some("fake-token".to_string()),
                expires_at: None,
                source: CredentialSource::InstanceRole,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn without_document(mut self) -> Self {
        self.document = None;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer<T: Clone>(&self, value: &Option<T>, what: &str) -> Result<T, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        value
            .clone()
            .ok_or_else(|| MetadataError::Unavailable(format!("{what} not available")))
    }
}

impl MetadataProvider for FakeMetadata {
    async fn region(&self) -> Result<String, MetadataError> {
        self.answer(&self.region, "region")
    }

    async fn instance_id(&self) -> Result<String, MetadataError> {
        self.answer(&self.instance_id, "instance id")
    }

    async fn identity_document(&self) -> Result<InstanceIdentityDocument, MetadataError> {
        self.answer(&self.document, "identity document")
    }

    async fn role_credentials(&self) -> Result<Credentials, MetadataError> {
        self.answer(&self.role_credentials, "role credentials")
    }
}
