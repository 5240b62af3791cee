//! Runs a custom resource's lifecycle actions against a [`ParameterStore`].
//!
//! One event maps to at most one SSM call. Ordering between resources,
//! retries and rollback belong to whoever sends the events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::infra::ParameterStore;
use crate::resource::{CustomResource, RemovalPolicy, SsmCall, Trigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn trigger(&self) -> Trigger {
        match self {
            RequestType::Create => Trigger::OnCreate,
            RequestType::Update => Trigger::OnUpdate,
            RequestType::Delete => Trigger::OnDelete,
        }
    }
}

/// A lifecycle request for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    /// The id the orchestrator currently tracks. Absent on first create.
    pub physical_resource_id: Option<String>,
}

impl LifecycleEvent {
    pub fn create() -> Self {
        Self {
            request_type: RequestType::Create,
            physical_resource_id: None,
        }
    }

    pub fn update(physical_resource_id: impl Into<String>) -> Self {
        Self {
            request_type: RequestType::Update,
            physical_resource_id: Some(physical_resource_id.into()),
        }
    }

    pub fn delete(physical_resource_id: impl Into<String>) -> Self {
        Self {
            request_type: RequestType::Delete,
            physical_resource_id: Some(physical_resource_id.into()),
        }
    }
}

/// What the orchestrator gets back: the physical id and the flattened response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    pub physical_resource_id: String,
    /// SDK operation that ran, `None` when the event was a no-op.
    pub invoked: Option<&'static str>,
    pub data: BTreeMap<String, String>,
}

pub struct CustomResourceHandler<S> {
    store: S,
}

impl<S: ParameterStore> CustomResourceHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn handle(
        &self,
        resource: &CustomResource,
        event: &LifecycleEvent,
    ) -> Result<ActionOutcome, StoreError> {
        self.handle_at(resource, event, Utc::now()).await
    }

    /// Handles `event` as if invoked at `now`.
    #[tracing::instrument(
        skip_all,
        fields(logical_id = resource.logical_id(), request = ?event.request_type)
    )]
    pub async fn handle_at(
        &self,
        resource: &CustomResource,
        event: &LifecycleEvent,
        now: DateTime<Utc>,
    ) -> Result<ActionOutcome, StoreError> {
        let previous_id = event
            .physical_resource_id
            .clone()
            .unwrap_or_else(|| resource.logical_id().to_string());

        if event.request_type == RequestType::Delete
            && resource.removal_policy() == RemovalPolicy::Retain
        {
            info!("Removal policy is retain, leaving remote parameter in place");
            return Ok(ActionOutcome {
                physical_resource_id: previous_id,
                ..Default::default()
            });
        }

        let trigger = event.request_type.trigger();
        let Some(action) = resource.action(trigger) else {
            debug!(%trigger, "No action registered");
            return Ok(ActionOutcome {
                physical_resource_id: previous_id,
                ..Default::default()
            });
        };

        let physical_resource_id = action.physical_id.resolve(now).unwrap_or(previous_id);
        let mut data = BTreeMap::new();

        match &action.call {
            SsmCall::PutParameter(input) => {
                let out = self.store.put_parameter(input).await.inspect_err(|e| {
                    error!(error = %e, parameter = %input.name, "putParameter failed");
                })?;
                data.insert("Version".to_string(), out.version.to_string());
                if let Some(tier) = out.tier {
                    data.insert("Tier".to_string(), tier);
                }
            }
            SsmCall::DeleteParameter(input) => {
                match self.store.delete_parameter(&input.name).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        warn!(
                            parameter = %input.name,
                            "Parameter already absent, treating delete as done"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, parameter = %input.name, "deleteParameter failed");
                        return Err(e);
                    }
                }
            }
            SsmCall::GetParameter(input) => {
                let record = self.store.get_parameter(input).await.inspect_err(|e| {
                    error!(error = %e, parameter = %input.name, "getParameter failed");
                })?;
                data.insert("Parameter.Name".to_string(), record.name);
                data.insert("Parameter.Type".to_string(), record.parameter_type);
                data.insert(
                    "Parameter.Value".to_string(),
                    record.value.expose().to_string(),
                );
                data.insert("Parameter.Version".to_string(), record.version.to_string());
                if let Some(arn) = record.arn {
                    data.insert("Parameter.ARN".to_string(), arn);
                }
            }
        }

        info!(
            %trigger,
            call = action.call.api_name(),
            parameter = action.call.parameter_name(),
            physical_resource_id = %physical_resource_id,
            "Lifecycle action completed"
        );

        Ok(ActionOutcome {
            physical_resource_id,
            invoked: Some(action.call.api_name()),
            data,
        })
    }
}
