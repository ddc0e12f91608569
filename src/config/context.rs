use crate::environment::EnvironmentSource;
use crate::metadata::{InstanceIdentityDocument, MetadataProvider};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Value bound to a context variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Scalar(String),
    List(Vec<String>),
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Scalar(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Scalar(value)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(values: Vec<String>) -> Self {
        ContextValue::List(values)
    }
}

/// Variables a config file may reference as `${name}`.
///
/// Two namespaces: `env.<NAME>` for every environment variable, and
/// `instance.<field>` for the EC2 identity document. The latter is absent
/// when the document could not be fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationContext {
    variables: BTreeMap<String, ContextValue>,
}

pub const ENV_PREFIX: &str = "env.";
pub const INSTANCE_PREFIX: &str = "instance.";

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn build(env: &impl EnvironmentSource, metadata: &impl MetadataProvider) -> Self {
        let mut context = Self::from_environment(env);

        match metadata.identity_document().await {
            Ok(document) => context.insert_identity_document(&document),
            Err(e) => debug!(error = %e, "Instance identity document unavailable, instance.* variables omitted"),
        }

        context
    }

    pub fn from_environment(env: &impl EnvironmentSource) -> Self {
        let mut context = Self::new();
        for (name, value) in env.pairs() {
            context.insert(format!("{ENV_PREFIX}{name}"), value);
        }
        context
    }

    pub fn insert_identity_document(&mut self, document: &InstanceIdentityDocument) {
        for (field, value) in identity_entries(document) {
            self.insert(format!("{INSTANCE_PREFIX}{field}"), value);
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ContextValue>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.variables.get(name)
    }

    pub fn has_instance_namespace(&self) -> bool {
        self.variables
            .keys()
            .any(|name| name.starts_with(INSTANCE_PREFIX))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

fn identity_entries(document: &InstanceIdentityDocument) -> [(&'static str, ContextValue); 14] {
    let scalar = |value: &String| ContextValue::Scalar(value.clone());
    let list = |values: &Vec<String>| ContextValue::List(values.clone());

    [
        ("devpayProductCodes", list(&document.devpay_product_codes)),
        ("marketplaceProductCodes", list(&document.marketplace_product_codes)),
        ("availabilityZone", scalar(&document.availability_zone)),
        ("privateIp", scalar(&document.private_ip)),
        ("version", scalar(&document.version)),
        ("region", scalar(&document.region)),
        ("instanceId", scalar(&document.instance_id)),
        ("billingProducts", list(&document.billing_products)),
        ("instanceType", scalar(&document.instance_type)),
        ("accountId", scalar(&document.account_id)),
        ("imageId", scalar(&document.image_id)),
        ("kernelId", scalar(&document.kernel_id)),
        ("ramdiskId", scalar(&document.ramdisk_id)),
        ("architecture", scalar(&document.architecture)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> InstanceIdentityDocument {
        InstanceIdentityDocument {
            availability_zone: "us-west-2a".to_string(),
            region: "us-west-2".to_string(),
            instance_id: "i-0abc".to_string(),
            account_id: "111122223333".to_string(),
            marketplace_product_codes: vec!["code-1".to_string(), "code-2".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_environment_entries_are_namespaced() {
        let env = ["FOO=bar", "QUERY=a=b"];
        let context = EvaluationContext::from_environment(&env);

        assert_eq!(context.get("env.FOO"), Some(&ContextValue::from("bar")));
        assert_eq!(context.get("env.QUERY"), Some(&ContextValue::from("a=b")));
        assert_eq!(context.get("FOO"), None);
        assert!(!context.has_instance_namespace());
    }

    #[test]
    fn test_identity_document_adds_all_fourteen_fields() {
        let mut context = EvaluationContext::new();
        context.insert_identity_document(&sample_document());

        assert_eq!(context.len(), 14);
        assert_eq!(
            context.get("instance.region"),
            Some(&ContextValue::from("us-west-2"))
        );
        assert_eq!(
            context.get("instance.marketplaceProductCodes"),
            Some(&ContextValue::List(vec![
                "code-1".to_string(),
                "code-2".to_string()
            ]))
        );
        // Empty lists stay lists rather than disappearing.
        assert_eq!(
            context.get("instance.billingProducts"),
            Some(&ContextValue::List(Vec::new()))
        );
        assert_eq!(
            context.get("instance.kernelId"),
            Some(&ContextValue::from(""))
        );
    }
}
