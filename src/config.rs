use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::context::{DEFAULT_PARTITION, StackContext};
use crate::key::{KeyReference, KmsKey};
use crate::parameter::{SecureStringParameter, SecureStringParameterProps, SecureStringValue};
use crate::policy::PermissionScope;
use crate::resource::RemovalPolicy;

/// Declared parameters and readers for one stack.
///
/// Stored as JSON on disk:
/// ```json
/// {
///   "region": "eu-west-1",
///   "accountId": "123456789012",
///   "parameters": [
///     { "id": "DbPassword", "name": "/app/db/password",
///       "valueEnv": "DB_PASSWORD", "keyId": "alias/app" }
///   ],
///   "readers": [ { "id": "DbPasswordValue", "name": "/app/db/password" } ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    pub partition: Option<String>,
    pub region: Option<String>,
    pub account_id: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
    #[serde(default)]
    pub readers: Vec<ReaderDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDeclaration {
    pub id: String,
    pub name: String,
    pub value: Option<String>,
    /// Environment variable holding the value, so plaintext stays out of the file.
    pub value_env: Option<String>,
    pub key_id: Option<String>,
    pub key: Option<KmsKey>,
    pub removal_policy: Option<RemovalPolicy>,
    pub permission_scope: Option<PermissionScope>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderDeclaration {
    pub id: String,
    pub name: String,
}

impl DeploymentConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("invalid config '{path}'"))
    }

    /// Like [`DeploymentConfig::load`], but a missing file yields an empty
    /// config whose stack context comes from the environment.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            debug!(path, "Config file not found, using environment only");
            Ok(Self::default())
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Region and account from the file, falling back to `AWS_REGION` and
    /// `AWS_ACCOUNT_ID`.
    pub fn stack_context(&self) -> Result<StackContext> {
        let region = self
            .region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .ok_or_else(|| anyhow!("region missing: set `region` or AWS_REGION"))?;
        let account_id = self
            .account_id
            .clone()
            .or_else(|| std::env::var("AWS_ACCOUNT_ID").ok())
            .ok_or_else(|| anyhow!("account missing: set `accountId` or AWS_ACCOUNT_ID"))?;
        let partition = self
            .partition
            .clone()
            .unwrap_or_else(|| DEFAULT_PARTITION.to_string());
        Ok(StackContext::new(region, account_id).with_partition(partition))
    }

    pub fn build_parameters(&self, ctx: &StackContext) -> Result<Vec<SecureStringParameter>> {
        self.parameters
            .iter()
            .map(|decl| {
                let props = decl.props()?;
                SecureStringParameter::new(ctx, &decl.id, props)
                    .with_context(|| format!("parameter '{}'", decl.id))
            })
            .collect()
    }

    pub fn build_readers(&self, ctx: &StackContext) -> Result<Vec<SecureStringValue>> {
        self.readers
            .iter()
            .map(|decl| {
                SecureStringParameter::value_for_secure_string_parameter(ctx, &decl.id, &decl.name)
                    .with_context(|| format!("reader '{}'", decl.id))
            })
            .collect()
    }
}

impl ParameterDeclaration {
    fn props(&self) -> Result<SecureStringParameterProps> {
        let value = match (&self.value, &self.value_env) {
            (Some(value), None) => value.clone(),
            (None, Some(var)) => std::env::var(var)
                .with_context(|| format!("parameter '{}': env var {var} is not set", self.id))?,
            (Some(_), Some(_)) => bail!("parameter '{}': set only one of value, valueEnv", self.id),
            (None, None) => bail!("parameter '{}': one of value, valueEnv is required", self.id),
        };
        let key = match (&self.key_id, &self.key) {
            (Some(id), None) => KeyReference::Id(id.clone()),
            (None, Some(key)) => KeyReference::Handle(key.clone()),
            (Some(_), Some(_)) => bail!("parameter '{}': set only one of keyId, key", self.id),
            (None, None) => bail!("parameter '{}': one of keyId, key is required", self.id),
        };

        let mut props = SecureStringParameterProps::new(&self.name, value, key);
        if let Some(policy) = self.removal_policy {
            props = props.removal_policy(policy);
        }
        if let Some(scope) = self.permission_scope {
            props = props.permission_scope(scope);
        }
        Ok(props)
    }
}
