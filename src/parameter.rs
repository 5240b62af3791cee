//! Secure string parameters in SSM Parameter Store.
//!
//! [`SecureStringParameter::new`] declares a parameter that is written on
//! create, overwritten on update and deleted on teardown.
//! [`SecureStringParameter::value_for_secure_string_parameter`] declares a
//! reader that fetches the decrypted value on every deploy.

use tracing::debug;

use crate::context::StackContext;
use crate::error::ProvisionError;
use crate::key::KeyReference;
use crate::policy::{ANY_RESOURCE, PermissionScope, PolicyStatement};
use crate::resource::{
    CustomResource, DeleteParameterInput, GetParameterInput, ParameterType, PhysicalIdStrategy,
    PutParameterInput, RemovalPolicy, ResponseFieldRef, SecretValue, SsmCall, Trigger,
};

/// Flattened response field holding the decrypted value.
pub const VALUE_FIELD: &str = "Parameter.Value";

#[derive(Debug, Clone)]
pub struct SecureStringParameterProps {
    pub parameter_name: String,
    pub value: SecretValue,
    pub key: KeyReference,
    pub removal_policy: Option<RemovalPolicy>,
    /// Overrides the scope implied by the key variant.
    pub permission_scope: Option<PermissionScope>,
}

impl SecureStringParameterProps {
    pub fn new(
        parameter_name: impl Into<String>,
        value: impl Into<String>,
        key: impl Into<KeyReference>,
    ) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            value: SecretValue::new(value),
            key: key.into(),
            removal_policy: None,
            permission_scope: None,
        }
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }

    pub fn permission_scope(mut self, scope: PermissionScope) -> Self {
        self.permission_scope = Some(scope);
        self
    }

    fn validate(&self) -> Result<(), ProvisionError> {
        if self.parameter_name.trim().is_empty() {
            return Err(ProvisionError::MissingField("parameter_name"));
        }
        if self.value.expose().is_empty() {
            return Err(ProvisionError::MissingField("value"));
        }
        self.key.validate()
    }
}

/// A declared secure string parameter.
#[derive(Debug, Clone)]
pub struct SecureStringParameter {
    parameter_name: String,
    key: KeyReference,
    resource: CustomResource,
}

/// A declared read of a secure string parameter.
#[derive(Debug, Clone)]
pub struct SecureStringValue {
    resource: CustomResource,
    value: ResponseFieldRef,
}

impl SecureStringValue {
    pub fn resource(&self) -> &CustomResource {
        &self.resource
    }

    /// Reference to the decrypted value. Only the deployment resolves it.
    pub fn value(&self) -> &ResponseFieldRef {
        &self.value
    }
}

impl SecureStringParameter {
    pub fn new(
        ctx: &StackContext,
        id: &str,
        props: SecureStringParameterProps,
    ) -> Result<Self, ProvisionError> {
        if id.trim().is_empty() {
            return Err(ProvisionError::MissingField("id"));
        }
        ctx.validate()?;
        props.validate()?;

        let name = props.parameter_name;
        let key_id = props.key.key_id().to_string();
        let put = |overwrite: Option<bool>| {
            SsmCall::PutParameter(PutParameterInput {
                name: name.clone(),
                value: props.value.clone(),
                parameter_type: ParameterType::SecureString,
                key_id: key_id.clone(),
                overwrite,
            })
        };
        let delete = SsmCall::DeleteParameter(DeleteParameterInput { name: name.clone() });

        let scope = props.permission_scope.unwrap_or(match props.key {
            KeyReference::Id(_) => PermissionScope::Scoped,
            KeyReference::Handle(_) => PermissionScope::AnyResource,
        });
        let policy = match scope {
            PermissionScope::Scoped => {
                let key_arn = match &props.key {
                    KeyReference::Id(id) => ctx.key_arn(id),
                    KeyReference::Handle(key) => key.key_arn.clone(),
                };
                vec![
                    PolicyStatement::allow(
                        [put(None).iam_action(), delete.iam_action()],
                        [ctx.parameter_arn(&name)],
                    ),
                    PolicyStatement::allow(["kms:Encrypt"], [key_arn]),
                ]
            }
            PermissionScope::AnyResource => vec![PolicyStatement::allow(
                [put(None).iam_action(), delete.iam_action()],
                [ANY_RESOURCE],
            )],
        };

        let resource = CustomResource::new(
            format!("{id}CustomResource"),
            props.removal_policy.unwrap_or_default(),
        )
        .with_action(put(None), Trigger::OnCreate, PhysicalIdStrategy::InvocationTime)
        .with_action(put(Some(true)), Trigger::OnUpdate, PhysicalIdStrategy::Inherit)
        .with_action(delete, Trigger::OnDelete, PhysicalIdStrategy::Inherit)
        .with_policy(policy);

        debug!(
            logical_id = resource.logical_id(),
            parameter = %name,
            ?scope,
            removal_policy = ?resource.removal_policy(),
            "Declared secure string parameter"
        );

        Ok(Self {
            parameter_name: name,
            key: props.key,
            resource,
        })
    }

    /// Declares a read of the latest version of `parameter_name`, decrypted.
    ///
    /// The physical id changes on every deploy, so the value is fetched again
    /// each time rather than cached from the first run.
    pub fn value_for_secure_string_parameter(
        ctx: &StackContext,
        id: &str,
        parameter_name: &str,
    ) -> Result<SecureStringValue, ProvisionError> {
        if id.trim().is_empty() {
            return Err(ProvisionError::MissingField("id"));
        }
        if parameter_name.trim().is_empty() {
            return Err(ProvisionError::MissingField("parameter_name"));
        }
        ctx.validate()?;

        let get = SsmCall::GetParameter(GetParameterInput {
            name: parameter_name.to_string(),
            with_decryption: true,
        });
        let policy = vec![
            PolicyStatement::allow([get.iam_action()], [ctx.parameter_arn(parameter_name)]),
            // the reader cannot know which key encrypted the value
            PolicyStatement::allow(["kms:Decrypt"], [ctx.any_key_arn()]),
        ];

        let resource = CustomResource::new(format!("{id}GetParameter"), RemovalPolicy::Destroy)
            .with_action(get.clone(), Trigger::OnCreate, PhysicalIdStrategy::InvocationTime)
            .with_action(get, Trigger::OnUpdate, PhysicalIdStrategy::InvocationTime)
            .with_policy(policy);
        let value = resource.response_field(VALUE_FIELD);

        debug!(
            logical_id = resource.logical_id(),
            parameter = parameter_name,
            "Declared secure string reader"
        );

        Ok(SecureStringValue { resource, value })
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn key(&self) -> &KeyReference {
        &self.key
    }

    pub fn resource(&self) -> &CustomResource {
        &self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KmsKey;
    use crate::resource::LifecycleAction;

    const KEY: &str = "arn:aws:kms:eu-west-1:123456789012:key/abc";

    fn ctx() -> StackContext {
        StackContext::new("eu-west-1", "123456789012")
    }

    fn declare(props: SecureStringParameterProps) -> SecureStringParameter {
        SecureStringParameter::new(&ctx(), "DbPassword", props).unwrap()
    }

    fn put_input(action: &LifecycleAction) -> &PutParameterInput {
        match &action.call {
            SsmCall::PutParameter(input) => input,
            other => panic!("expected putParameter, got {}", other.api_name()),
        }
    }

    #[test]
    fn test_registers_create_update_delete() {
        let param = declare(SecureStringParameterProps::new("/app/db/password", "s3cr3t", KEY));
        let resource = param.resource();

        let names: Vec<_> = resource.actions().map(|a| (a.trigger, a.call.api_name())).collect();
        assert_eq!(
            names,
            vec![
                (Trigger::OnCreate, "putParameter"),
                (Trigger::OnUpdate, "putParameter"),
                (Trigger::OnDelete, "deleteParameter"),
            ]
        );
        assert_eq!(resource.logical_id(), "DbPasswordCustomResource");
    }

    #[test]
    fn test_create_call_fields() {
        let param = declare(SecureStringParameterProps::new("/app/db/password", "s3cr3t", KEY));
        let create = put_input(param.resource().action(Trigger::OnCreate).unwrap());

        assert_eq!(create.name, "/app/db/password");
        assert_eq!(create.value.expose(), "s3cr3t");
        assert_eq!(create.parameter_type, ParameterType::SecureString);
        assert_eq!(create.key_id, KEY);
        assert_eq!(create.overwrite, None);
    }

    #[test]
    fn test_update_sets_overwrite() {
        let param = declare(SecureStringParameterProps::new("/app/db/password", "s3cr3t", KEY));
        let update = param.resource().action(Trigger::OnUpdate).unwrap();

        assert_eq!(put_input(update).overwrite, Some(true));
        assert_eq!(update.physical_id, PhysicalIdStrategy::Inherit);
    }

    #[test]
    fn test_delete_keyed_by_name() {
        let param = declare(SecureStringParameterProps::new("/app/db/password", "s3cr3t", KEY));
        let delete = param.resource().action(Trigger::OnDelete).unwrap();
        assert_eq!(
            delete.call,
            SsmCall::DeleteParameter(DeleteParameterInput {
                name: "/app/db/password".to_string()
            })
        );
    }

    #[test]
    fn test_raw_key_id_gets_scoped_statements() {
        let param = declare(SecureStringParameterProps::new("/app/db/password", "s3cr3t", "abc"));
        let policy = param.resource().policy();
        let param_arn = "arn:aws:ssm:eu-west-1:123456789012:parameter/app/db/password";
        let key_arn = "arn:aws:kms:eu-west-1:123456789012:key/abc";

        assert_eq!(policy.len(), 2);
        assert!(policy[0].allows("ssm:PutParameter", param_arn));
        assert!(policy[0].allows("ssm:DeleteParameter", param_arn));
        assert!(policy[1].allows("kms:Encrypt", key_arn));
        assert!(policy.iter().all(|s| !s.is_unrestricted()));
    }

    #[test]
    fn test_typed_handle_gets_unrestricted_grant() {
        let key = KmsKey::new("abc", KEY);
        let param = declare(SecureStringParameterProps::new("/app/db/password", "s3cr3t", key));
        let policy = param.resource().policy();

        assert_eq!(policy.len(), 1);
        assert!(policy[0].is_unrestricted());
        assert_eq!(
            policy[0].actions,
            vec!["ssm:PutParameter", "ssm:DeleteParameter"]
        );
        assert_eq!(
            put_input(param.resource().action(Trigger::OnCreate).unwrap()).key_id,
            "abc"
        );
    }

    #[test]
    fn test_typed_handle_can_opt_into_scoping() {
        let key = KmsKey::new("abc", KEY);
        let props = SecureStringParameterProps::new("/app/db/password", "s3cr3t", key)
            .permission_scope(PermissionScope::Scoped);
        let policy = declare(props).resource().policy().to_vec();

        assert_eq!(policy.len(), 2);
        assert!(policy[1].allows("kms:Encrypt", KEY));
        assert!(policy.iter().all(|s| !s.is_unrestricted()));
    }

    #[test]
    fn test_removal_policy_defaults_to_destroy() {
        let param = declare(SecureStringParameterProps::new("/a", "v", "k"));
        assert_eq!(param.resource().removal_policy(), RemovalPolicy::Destroy);

        let retained = declare(
            SecureStringParameterProps::new("/a", "v", "k").removal_policy(RemovalPolicy::Retain),
        );
        assert_eq!(retained.resource().removal_policy(), RemovalPolicy::Retain);
    }

    #[test]
    fn test_missing_inputs_fail_fast() {
        let ctx = ctx();
        let cases = [
            (SecureStringParameterProps::new("", "v", "k"), "parameter_name"),
            (SecureStringParameterProps::new("/a", "", "k"), "value"),
            (SecureStringParameterProps::new("/a", "v", ""), "key_id"),
        ];
        for (props, field) in cases {
            let err = SecureStringParameter::new(&ctx, "Id", props).unwrap_err();
            assert_eq!(err, ProvisionError::MissingField(field));
        }
    }

    #[test]
    fn test_reader_registers_create_and_update_only() {
        let reader = SecureStringParameter::value_for_secure_string_parameter(
            &ctx(),
            "Db",
            "/app/db/password",
        )
        .unwrap();
        let resource = reader.resource();

        assert!(resource.action(Trigger::OnDelete).is_none());
        assert_eq!(resource.actions().count(), 2);
        for action in resource.actions() {
            assert_eq!(
                action.call,
                SsmCall::GetParameter(GetParameterInput {
                    name: "/app/db/password".to_string(),
                    with_decryption: true,
                })
            );
            assert_eq!(action.physical_id, PhysicalIdStrategy::InvocationTime);
        }
        assert_eq!(reader.value().field(), "Parameter.Value");
        assert_eq!(reader.value().logical_id(), "DbGetParameter");
    }

    #[test]
    fn test_reader_permissions() {
        let reader = SecureStringParameter::value_for_secure_string_parameter(
            &ctx(),
            "Db",
            "/app/db/password",
        )
        .unwrap();
        let policy = reader.resource().policy();

        assert!(policy[0].allows(
            "ssm:GetParameter",
            "arn:aws:ssm:eu-west-1:123456789012:parameter/app/db/password"
        ));
        assert!(policy[1].allows("kms:Decrypt", "arn:aws:kms:eu-west-1:123456789012:key/*"));
    }

    #[test]
    fn test_reader_rejects_blank_name() {
        let err = SecureStringParameter::value_for_secure_string_parameter(&ctx(), "Db", " ")
            .unwrap_err();
        assert_eq!(err, ProvisionError::MissingField("parameter_name"));
    }
}
