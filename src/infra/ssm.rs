use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::types::ParameterType as SdkParameterType;
use tracing::debug;

use super::{ParameterRecord, ParameterStore, PutParameterOutput};
use crate::error::StoreError;
use crate::resource::{GetParameterInput, ParameterType, PutParameterInput, SecretValue};

/// Runs parameter operations against AWS SSM Parameter Store.
///
/// The caller's credentials need the statements the declared resource lists,
/// plus the matching KMS permissions for the parameter's key.
pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
}

impl SsmParameterStore {
    /// Creates a store from an already loaded AWS configuration.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }

    /// Same as [`SsmParameterStore::new`] but against a custom endpoint,
    /// e.g. a local emulator.
    pub fn with_endpoint(config: &aws_config::SdkConfig, endpoint: &str) -> Self {
        let conf = aws_sdk_ssm::config::Builder::from(config)
            .endpoint_url(endpoint)
            .build();
        Self {
            client: aws_sdk_ssm::Client::from_conf(conf),
        }
    }
}

fn classify<E, R>(operation: &'static str, name: &str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let name = name.to_string();
    match err.code() {
        Some("ParameterNotFound") => StoreError::ParameterNotFound(name),
        Some("ParameterAlreadyExists") => StoreError::ParameterAlreadyExists(name),
        Some("AccessDeniedException") => StoreError::AccessDenied { name, message },
        Some(code) if code == "InvalidKeyId" || code.starts_with("KMS") => {
            StoreError::KeyAccess { name, message }
        }
        _ => StoreError::Api {
            operation,
            name,
            message,
        },
    }
}

#[async_trait::async_trait]
impl ParameterStore for SsmParameterStore {
    #[tracing::instrument(
        skip(self, input),
        fields(name = %input.name, overwrite = ?input.overwrite)
    )]
    async fn put_parameter(
        &self,
        input: &PutParameterInput,
    ) -> Result<PutParameterOutput, StoreError> {
        let parameter_type = match input.parameter_type {
            ParameterType::SecureString => SdkParameterType::SecureString,
        };
        let resp = self
            .client
            .put_parameter()
            .name(&input.name)
            .value(input.value.expose())
            .r#type(parameter_type)
            .key_id(&input.key_id)
            .set_overwrite(input.overwrite)
            .send()
            .await
            .map_err(|e| classify("PutParameter", &input.name, e))?;

        debug!(version = resp.version(), "SSM PutParameter succeeded");
        Ok(PutParameterOutput {
            version: resp.version(),
            tier: resp.tier().map(|t| t.as_str().to_string()),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete_parameter(&self, name: &str) -> Result<(), StoreError> {
        self.client
            .delete_parameter()
            .name(name)
            .send()
            .await
            .map_err(|e| classify("DeleteParameter", name, e))?;
        Ok(())
    }

    #[tracing::instrument(
        skip(self, input),
        fields(name = %input.name, with_decryption = input.with_decryption)
    )]
    async fn get_parameter(
        &self,
        input: &GetParameterInput,
    ) -> Result<ParameterRecord, StoreError> {
        let resp = self
            .client
            .get_parameter()
            .name(&input.name)
            .with_decryption(input.with_decryption)
            .send()
            .await
            .map_err(|e| classify("GetParameter", &input.name, e))?;

        let parameter = resp.parameter.ok_or_else(|| StoreError::Api {
            operation: "GetParameter",
            name: input.name.clone(),
            message: "response carried no parameter".to_string(),
        })?;
        let value = parameter.value().ok_or_else(|| StoreError::Api {
            operation: "GetParameter",
            name: input.name.clone(),
            message: "parameter exists but has no value".to_string(),
        })?;

        Ok(ParameterRecord {
            name: parameter.name().unwrap_or(input.name.as_str()).to_string(),
            parameter_type: parameter
                .r#type()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            value: SecretValue::new(value),
            version: parameter.version(),
            arn: parameter.arn().map(str::to_string),
        })
    }
}
