use std::sync::Arc;

use chrono::{DateTime, Utc};
use secure_string_parameter::infra::{MemoryParameterStore, RecordedCall};
use secure_string_parameter::resource::{SsmCall, Trigger};
use secure_string_parameter::{
    CustomResourceHandler, LifecycleEvent, RemovalPolicy, SecureStringParameter,
    SecureStringParameterProps, StackContext,
};

const KEY: &str = "arn:aws:kms:eu-west-1:123456789012:key/abc";

fn ctx() -> StackContext {
    StackContext::new("eu-west-1", "123456789012")
}

fn at(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap()
}

fn db_password(removal_policy: Option<RemovalPolicy>) -> SecureStringParameter {
    let mut props = SecureStringParameterProps::new("/app/db/password", "s3cr3t", KEY);
    if let Some(policy) = removal_policy {
        props = props.removal_policy(policy);
    }
    SecureStringParameter::new(&ctx(), "DbPassword", props).unwrap()
}

#[test]
fn test_create_call_matches_expected_request() {
    let param = db_password(None);
    let create = param.resource().action(Trigger::OnCreate).unwrap();

    let json = serde_json::to_value(&create.call).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "action": "putParameter",
            "parameters": {
                "Name": "/app/db/password",
                "Value": "s3cr3t",
                "Type": "SecureString",
                "KeyId": KEY,
            }
        })
    );
}

#[tokio::test]
async fn test_full_lifecycle_against_memory_store() {
    let store = Arc::new(MemoryParameterStore::new());
    let handler = CustomResourceHandler::new(store.clone());
    let param = db_password(None);

    let created = handler
        .handle_at(param.resource(), &LifecycleEvent::create(), at(1_000))
        .await
        .unwrap();
    assert_eq!(store.value_of("/app/db/password").as_deref(), Some("s3cr3t"));

    // identical inputs on update overwrite instead of conflicting
    handler
        .handle_at(
            param.resource(),
            &LifecycleEvent::update(&created.physical_resource_id),
            at(2_000),
        )
        .await
        .unwrap();

    handler
        .handle(
            param.resource(),
            &LifecycleEvent::delete(&created.physical_resource_id),
        )
        .await
        .unwrap();
    assert!(!store.contains("/app/db/password"));

    assert_eq!(
        store.calls(),
        vec![
            RecordedCall::Put {
                name: "/app/db/password".to_string(),
                key_id: KEY.to_string(),
                overwrite: false,
            },
            RecordedCall::Put {
                name: "/app/db/password".to_string(),
                key_id: KEY.to_string(),
                overwrite: true,
            },
            RecordedCall::Delete {
                name: "/app/db/password".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_teardown_with_destroy_deletes_once() {
    for policy in [None, Some(RemovalPolicy::Destroy)] {
        let store = Arc::new(MemoryParameterStore::new());
        store.seed("/app/db/password", "s3cr3t", KEY);
        let handler = CustomResourceHandler::new(store.clone());

        handler
            .handle(db_password(policy).resource(), &LifecycleEvent::delete("1"))
            .await
            .unwrap();

        let deletes: Vec<_> = store
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RecordedCall::Delete { .. }))
            .collect();
        assert_eq!(
            deletes,
            vec![RecordedCall::Delete {
                name: "/app/db/password".to_string()
            }]
        );
    }
}

#[tokio::test]
async fn test_teardown_with_retain_skips_delete() {
    let store = Arc::new(MemoryParameterStore::new());
    store.seed("/app/db/password", "s3cr3t", KEY);
    let handler = CustomResourceHandler::new(store.clone());
    let param = db_password(Some(RemovalPolicy::Retain));

    let outcome = handler
        .handle(param.resource(), &LifecycleEvent::delete("1"))
        .await
        .unwrap();

    assert_eq!(outcome.invoked, None);
    assert_eq!(outcome.physical_resource_id, "1");
    assert!(store.calls().is_empty());
    assert!(store.contains("/app/db/password"));
}

#[tokio::test]
async fn test_reader_refetches_rotated_value_on_every_deploy() {
    let store = Arc::new(MemoryParameterStore::new());
    store.seed("/app/db/password", "first", KEY);
    let handler = CustomResourceHandler::new(store.clone());
    let reader =
        SecureStringParameter::value_for_secure_string_parameter(&ctx(), "Db", "/app/db/password")
            .unwrap();

    let first = handler
        .handle_at(reader.resource(), &LifecycleEvent::create(), at(1_000))
        .await
        .unwrap();
    store.seed("/app/db/password", "second", KEY);
    let second = handler
        .handle_at(
            reader.resource(),
            &LifecycleEvent::update(&first.physical_resource_id),
            at(5_000),
        )
        .await
        .unwrap();

    assert_ne!(first.physical_resource_id, second.physical_resource_id);
    assert_eq!(reader.value().resolve(&first), Some("first"));
    assert_eq!(reader.value().resolve(&second), Some("second"));

    let reads = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RecordedCall::Get { with_decryption: true, .. }))
        .count();
    assert_eq!(reads, 2);
}

#[test]
fn test_reader_shape_holds_for_any_name() {
    for name in ["/a", "/app/db/password", "flat-name", "/deeply/nested/path/x"] {
        let reader =
            SecureStringParameter::value_for_secure_string_parameter(&ctx(), "R", name).unwrap();
        let triggers: Vec<_> = reader.resource().actions().map(|a| a.trigger).collect();
        assert_eq!(triggers, vec![Trigger::OnCreate, Trigger::OnUpdate]);
        assert!(reader.resource().actions().all(|a| matches!(
            &a.call,
            SsmCall::GetParameter(input) if input.with_decryption && input.name == name
        )));
    }
}

#[tokio::test]
async fn test_provisioner_then_reader_round_trip() {
    let store = Arc::new(MemoryParameterStore::new());
    let handler = CustomResourceHandler::new(store.clone());
    let param = db_password(None);
    let reader = SecureStringParameter::value_for_secure_string_parameter(
        &ctx(),
        "DbValue",
        param.parameter_name(),
    )
    .unwrap();

    handler
        .handle(param.resource(), &LifecycleEvent::create())
        .await
        .unwrap();
    let outcome = handler
        .handle(reader.resource(), &LifecycleEvent::create())
        .await
        .unwrap();

    assert_eq!(reader.value().resolve(&outcome), Some("s3cr3t"));
}
