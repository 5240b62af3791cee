//! Stack-level settings that get interpolated into ARNs.

use crate::error::ProvisionError;

pub const DEFAULT_PARTITION: &str = "aws";

/// Region and account the resources are declared in.
///
/// Passed explicitly to every construct instead of being looked up from
/// whatever stack happens to enclose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackContext {
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl StackContext {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            partition: DEFAULT_PARTITION.to_string(),
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    /// Overrides the ARN partition (e.g. `aws-cn`, `aws-us-gov`).
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.partition.trim().is_empty() {
            return Err(ProvisionError::MissingField("partition"));
        }
        if self.region.trim().is_empty() {
            return Err(ProvisionError::MissingField("region"));
        }
        if self.account_id.trim().is_empty() {
            return Err(ProvisionError::MissingField("account_id"));
        }
        Ok(())
    }

    /// ARN of an SSM parameter. Hierarchical names already carry their
    /// leading slash, flat names get one.
    pub fn parameter_arn(&self, name: &str) -> String {
        let separator = if name.starts_with('/') { "" } else { "/" };
        format!(
            "arn:{}:ssm:{}:{}:parameter{}{}",
            self.partition, self.region, self.account_id, separator, name
        )
    }

    /// ARN of a KMS key given its id, alias or full ARN.
    pub fn key_arn(&self, key_id: &str) -> String {
        if key_id.starts_with("arn:") {
            return key_id.to_string();
        }
        if key_id.starts_with("alias/") {
            return format!(
                "arn:{}:kms:{}:{}:{}",
                self.partition, self.region, self.account_id, key_id
            );
        }
        format!(
            "arn:{}:kms:{}:{}:key/{}",
            self.partition, self.region, self.account_id, key_id
        )
    }

    /// Matches every key in the account and region.
    pub fn any_key_arn(&self) -> String {
        self.key_arn("*")
    }
}
