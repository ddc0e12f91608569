//! EC2 instance metadata capability.
//!
//! The resolver only ever talks to [`MetadataProvider`]; [`Ec2MetadataClient`]
//! is the production implementation backed by the instance metadata service.

mod client;
mod document;

pub use client::{DEFAULT_ENDPOINT, Ec2MetadataClient, MetadataClientConfig};
pub use document::InstanceIdentityDocument;

use crate::credentials::Credentials;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Instance metadata access is disabled")]
    Disabled,
    #[error("Invalid metadata endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Metadata request to {path} failed: {status}")]
    Status { path: String, status: u16 },
    #[error("Metadata request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Malformed metadata response from {path}: {message}")]
    Malformed { path: String, message: String },
    #[error("Metadata unavailable: {0}")]
    Unavailable(String),
}

/// Queries the resolver needs from the host's cloud metadata service.
///
/// Implementations own their timeout and retry behaviour; callers only see
/// success or a [`MetadataError`].
pub trait MetadataProvider: Send + Sync {
    fn region(&self) -> impl std::future::Future<Output = Result<String, MetadataError>> + Send;

    fn instance_id(
        &self,
    ) -> impl std::future::Future<Output = Result<String, MetadataError>> + Send;

    fn identity_document(
        &self,
    ) -> impl std::future::Future<Output = Result<InstanceIdentityDocument, MetadataError>> + Send;

    /// Credentials of the IAM role attached to the instance.
    fn role_credentials(
        &self,
    ) -> impl std::future::Future<Output = Result<Credentials, MetadataError>> + Send;
}
