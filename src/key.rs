//! How a parameter names the KMS key that encrypts it.

use serde::Deserialize;

use crate::error::ProvisionError;

/// A KMS key that is already known as a typed object, with both its id and ARN.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmsKey {
    pub key_id: String,
    pub key_arn: String,
}

impl KmsKey {
    pub fn new(key_id: impl Into<String>, key_arn: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_arn: key_arn.into(),
        }
    }
}

/// Either a raw key identifier (id, alias or ARN) or a typed key handle.
///
/// The variant decides which permission statements a parameter gets by
/// default, see [`crate::policy::PermissionScope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyReference {
    Id(String),
    Handle(KmsKey),
}

impl KeyReference {
    /// The value sent as `KeyId` on `putParameter`.
    pub fn key_id(&self) -> &str {
        match self {
            KeyReference::Id(id) => id,
            KeyReference::Handle(key) => &key.key_id,
        }
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        match self {
            KeyReference::Id(id) if id.trim().is_empty() => {
                Err(ProvisionError::MissingField("key_id"))
            }
            KeyReference::Handle(key) if key.key_id.trim().is_empty() => {
                Err(ProvisionError::MissingField("key.key_id"))
            }
            KeyReference::Handle(key) if key.key_arn.trim().is_empty() => {
                Err(ProvisionError::MissingField("key.key_arn"))
            }
            _ => Ok(()),
        }
    }
}

impl From<&str> for KeyReference {
    fn from(id: &str) -> Self {
        KeyReference::Id(id.to_string())
    }
}

impl From<String> for KeyReference {
    fn from(id: String) -> Self {
        KeyReference::Id(id)
    }
}

impl From<KmsKey> for KeyReference {
    fn from(key: KmsKey) -> Self {
        KeyReference::Handle(key)
    }
}
