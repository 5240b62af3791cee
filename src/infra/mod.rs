//! Parameter store backends.
//!
//! [`ParameterStore`] is the async trait the lifecycle handler calls into.
//! [`SsmParameterStore`] implements it with AWS SSM Parameter Store.
//! [`MemoryParameterStore`] keeps parameters in memory and records every call.

mod memory;
mod ssm;

pub use memory::{MemoryParameterStore, RecordedCall};
pub use ssm::SsmParameterStore;

use crate::error::StoreError;
use crate::resource::{GetParameterInput, PutParameterInput, SecretValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutParameterOutput {
    pub version: i64,
    pub tier: Option<String>,
}

/// A parameter as returned by a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRecord {
    pub name: String,
    pub parameter_type: String,
    pub value: SecretValue,
    pub version: i64,
    pub arn: Option<String>,
}

/// The three SSM operations a secure string parameter needs.
#[async_trait::async_trait]
pub trait ParameterStore: Send + Sync {
    async fn put_parameter(
        &self,
        input: &PutParameterInput,
    ) -> Result<PutParameterOutput, StoreError>;

    async fn delete_parameter(&self, name: &str) -> Result<(), StoreError>;

    async fn get_parameter(
        &self,
        input: &GetParameterInput,
    ) -> Result<ParameterRecord, StoreError>;
}

#[async_trait::async_trait]
impl<T: ParameterStore + ?Sized> ParameterStore for std::sync::Arc<T> {
    async fn put_parameter(
        &self,
        input: &PutParameterInput,
    ) -> Result<PutParameterOutput, StoreError> {
        (**self).put_parameter(input).await
    }

    async fn delete_parameter(&self, name: &str) -> Result<(), StoreError> {
        (**self).delete_parameter(name).await
    }

    async fn get_parameter(
        &self,
        input: &GetParameterInput,
    ) -> Result<ParameterRecord, StoreError> {
        (**self).get_parameter(input).await
    }
}
