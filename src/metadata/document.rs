use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Self-describing metadata blob served at
/// `/latest/dynamic/instance-identity/document`.
///
/// EC2 reports absent values as `null` (notably `kernelId`, `ramdiskId` and
/// the product-code lists); those decode to empty strings and empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIdentityDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub devpay_product_codes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub marketplace_product_codes: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub availability_zone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub private_ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub region: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instance_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub billing_products: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instance_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub account_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kernel_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ramdisk_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub architecture: String,
    #[serde(default)]
    pub pending_time: Option<DateTime<Utc>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
