//! Renders custom resource descriptors as a CloudFormation-shaped document.
//!
//! Each resource becomes a `Custom::AWS` entry whose `Create`, `Update` and
//! `Delete` properties are JSON strings describing the SDK call, plus an
//! `AWS::IAM::Policy` carrying its statements.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::resource::{CustomResource, Trigger};

pub const RESOURCE_TYPE: &str = "Custom::AWS";
pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone)]
pub struct Template {
    resources: Map<String, Value>,
    outputs: Map<String, Value>,
}

impl Template {
    pub fn from_resources<'a>(
        resources: impl IntoIterator<Item = &'a CustomResource>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut template = Self {
            resources: Map::new(),
            outputs: Map::new(),
        };
        for resource in resources {
            template.add(resource, now);
        }
        template
    }

    fn add(&mut self, resource: &CustomResource, now: DateTime<Utc>) {
        let policy_id = format!("{}Policy", resource.logical_id());

        let mut properties = Map::new();
        for (trigger, key) in [
            (Trigger::OnCreate, "Create"),
            (Trigger::OnUpdate, "Update"),
            (Trigger::OnDelete, "Delete"),
        ] {
            if let Some(action) = resource.action(trigger) {
                properties.insert(
                    key.to_string(),
                    Value::String(action.to_sdk_call_json(now).to_string()),
                );
            }
        }
        properties.insert("InstallLatestAwsSdk".to_string(), Value::Bool(false));

        let deletion_policy = resource.removal_policy().deletion_policy();
        self.resources.insert(
            resource.logical_id().to_string(),
            json!({
                "Type": RESOURCE_TYPE,
                "Properties": properties,
                "DependsOn": [policy_id],
                "UpdateReplacePolicy": deletion_policy,
                "DeletionPolicy": deletion_policy,
            }),
        );
        self.resources.insert(
            policy_id.clone(),
            json!({
                "Type": "AWS::IAM::Policy",
                "Properties": {
                    "PolicyName": policy_id,
                    "PolicyDocument": {
                        "Version": POLICY_VERSION,
                        "Statement": resource.policy(),
                    },
                },
            }),
        );
    }

    /// Exposes a deploy-time reference as a stack output.
    pub fn add_output(&mut self, name: &str, reference: Value) {
        self.outputs
            .insert(name.to_string(), json!({ "Value": reference }));
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    pub fn to_json(&self) -> Value {
        let mut doc = json!({ "Resources": self.resources });
        if !self.outputs.is_empty() {
            doc["Outputs"] = Value::Object(self.outputs.clone());
        }
        doc
    }

    pub fn to_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_json())
    }
}
