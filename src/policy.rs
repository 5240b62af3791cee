//! IAM statements a custom resource's execution role needs.
//!
//! These are declarations only. The deployment pipeline turns them into a
//! role policy; nothing here checks them at runtime.

use serde::{Deserialize, Serialize};

pub const ANY_RESOURCE: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: &'static str,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource")]
    pub resources: Vec<String>,
}

impl PolicyStatement {
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for action in actions.into_iter().map(Into::into) {
            if !deduped.contains(&action) {
                deduped.push(action);
            }
        }
        Self {
            effect: "Allow",
            actions: deduped,
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, action: &str, resource: &str) -> bool {
        self.actions.iter().any(|a| a == action)
            && self
                .resources
                .iter()
                .any(|r| r == resource || r == ANY_RESOURCE)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.resources.iter().any(|r| r == ANY_RESOURCE)
    }
}

/// How tightly a parameter's statements are scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionScope {
    /// Write and delete on the parameter ARN, encrypt on the key ARN.
    Scoped,
    /// Every SDK call the resource makes, on `*`.
    AnyResource,
}
