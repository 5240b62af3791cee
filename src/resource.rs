//! Lifecycle-action descriptors for SSM-backed custom resources.
//!
//! A [`CustomResource`] is plain data: which SSM call to make on create,
//! update and delete, how to derive the physical resource id, and which IAM
//! statements the calls need. Running the calls is [`crate::handler`]'s job.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::handler::ActionOutcome;
use crate::policy::PolicyStatement;

pub const SSM_SERVICE: &str = "SSM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    OnCreate,
    OnUpdate,
    OnDelete,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::OnCreate => "onCreate",
            Trigger::OnUpdate => "onUpdate",
            Trigger::OnDelete => "onDelete",
        };
        f.write_str(name)
    }
}

/// What happens to the remote parameter when its declaration goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalPolicy {
    #[default]
    Destroy,
    Retain,
}

impl RemovalPolicy {
    /// CloudFormation `DeletionPolicy` value.
    pub fn deletion_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}

/// Plaintext secret. Serialized as-is into call parameters, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterType {
    SecureString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutParameterInput {
    pub name: String,
    pub value: SecretValue,
    #[serde(rename = "Type")]
    pub parameter_type: ParameterType,
    pub key_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteParameterInput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetParameterInput {
    pub name: String,
    pub with_decryption: bool,
}

/// One SSM API call with its request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "parameters", rename_all = "camelCase")]
pub enum SsmCall {
    PutParameter(PutParameterInput),
    DeleteParameter(DeleteParameterInput),
    GetParameter(GetParameterInput),
}

impl SsmCall {
    /// SDK operation name as the custom-resource provider expects it.
    pub fn api_name(&self) -> &'static str {
        match self {
            SsmCall::PutParameter(_) => "putParameter",
            SsmCall::DeleteParameter(_) => "deleteParameter",
            SsmCall::GetParameter(_) => "getParameter",
        }
    }

    pub fn iam_action(&self) -> &'static str {
        match self {
            SsmCall::PutParameter(_) => "ssm:PutParameter",
            SsmCall::DeleteParameter(_) => "ssm:DeleteParameter",
            SsmCall::GetParameter(_) => "ssm:GetParameter",
        }
    }

    pub fn parameter_name(&self) -> &str {
        match self {
            SsmCall::PutParameter(input) => &input.name,
            SsmCall::DeleteParameter(input) => &input.name,
            SsmCall::GetParameter(input) => &input.name,
        }
    }
}

/// How the physical resource id reported back to the orchestrator is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalIdStrategy {
    /// A fresh id from the invocation timestamp. The orchestrator sees a new
    /// id on every run and never skips the call as unchanged.
    ///
    /// Ids have millisecond resolution: two invocations within the same
    /// millisecond get the same id, and the second one may be skipped.
    InvocationTime,
    /// Keep whatever id the orchestrator already tracks.
    Inherit,
}

impl PhysicalIdStrategy {
    /// Resolves the id at `now`. `None` means "keep the previous one".
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<String> {
        match self {
            PhysicalIdStrategy::InvocationTime => Some(now.timestamp_millis().to_string()),
            PhysicalIdStrategy::Inherit => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleAction {
    pub trigger: Trigger,
    pub call: SsmCall,
    pub physical_id: PhysicalIdStrategy,
}

impl LifecycleAction {
    pub fn new(trigger: Trigger, call: SsmCall, physical_id: PhysicalIdStrategy) -> Self {
        Self {
            trigger,
            call,
            physical_id,
        }
    }

    /// The `{service, action, parameters, physicalResourceId}` object a
    /// `Custom::AWS` resource carries for this trigger.
    pub fn to_sdk_call_json(&self, now: DateTime<Utc>) -> Value {
        let mut call = json!({ "service": SSM_SERVICE });
        if let (Value::Object(target), Ok(Value::Object(body))) =
            (&mut call, serde_json::to_value(&self.call))
        {
            target.extend(body);
            if let Some(id) = self.physical_id.resolve(now) {
                target.insert("physicalResourceId".to_string(), json!({ "id": id }));
            }
        }
        call
    }
}

/// Immutable description of one custom resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomResource {
    logical_id: String,
    on_create: Option<LifecycleAction>,
    on_update: Option<LifecycleAction>,
    on_delete: Option<LifecycleAction>,
    policy: Vec<PolicyStatement>,
    removal_policy: RemovalPolicy,
}

impl CustomResource {
    pub(crate) fn new(logical_id: String, removal_policy: RemovalPolicy) -> Self {
        Self {
            logical_id,
            on_create: None,
            on_update: None,
            on_delete: None,
            policy: Vec::new(),
            removal_policy,
        }
    }

    pub(crate) fn with_action(
        mut self,
        call: SsmCall,
        trigger: Trigger,
        id: PhysicalIdStrategy,
    ) -> Self {
        let action = Some(LifecycleAction::new(trigger, call, id));
        match trigger {
            Trigger::OnCreate => self.on_create = action,
            Trigger::OnUpdate => self.on_update = action,
            Trigger::OnDelete => self.on_delete = action,
        }
        self
    }

    pub(crate) fn with_policy(mut self, policy: Vec<PolicyStatement>) -> Self {
        self.policy = policy;
        self
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy
    }

    pub fn policy(&self) -> &[PolicyStatement] {
        &self.policy
    }

    pub fn action(&self, trigger: Trigger) -> Option<&LifecycleAction> {
        match trigger {
            Trigger::OnCreate => self.on_create.as_ref(),
            Trigger::OnUpdate => self.on_update.as_ref(),
            Trigger::OnDelete => self.on_delete.as_ref(),
        }
    }

    /// Registered actions in create, update, delete order.
    pub fn actions(&self) -> impl Iterator<Item = &LifecycleAction> {
        [&self.on_create, &self.on_update, &self.on_delete]
            .into_iter()
            .flatten()
    }

    /// Refers to a field of this resource's response, resolved at deploy time.
    pub fn response_field(&self, field: &str) -> ResponseFieldRef {
        ResponseFieldRef {
            logical_id: self.logical_id.clone(),
            field: field.to_string(),
        }
    }
}

/// Opaque deploy-time reference to a flattened response field, e.g.
/// `Parameter.Value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFieldRef {
    logical_id: String,
    field: String,
}

impl ResponseFieldRef {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn to_cfn(&self) -> Value {
        json!({ "Fn::GetAtt": [self.logical_id, self.field] })
    }

    pub fn resolve<'a>(&self, outcome: &'a ActionOutcome) -> Option<&'a str> {
        outcome.data.get(&self.field).map(String::as_str)
    }
}
