use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{ParameterRecord, ParameterStore, PutParameterOutput};
use crate::error::StoreError;
use crate::resource::{GetParameterInput, PutParameterInput, SecretValue};

/// A call observed by [`MemoryParameterStore`], without the secret value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Put { name: String, key_id: String, overwrite: bool },
    Delete { name: String },
    Get { name: String, with_decryption: bool },
}

#[derive(Debug, Clone)]
struct StoredParameter {
    value: SecretValue,
    key_id: String,
    version: i64,
}

#[derive(Debug, Default)]
struct State {
    parameters: HashMap<String, StoredParameter>,
    calls: Vec<RecordedCall>,
}

/// In-process stand-in for SSM with the same conflict and not-found rules.
#[derive(Debug, Default)]
pub struct MemoryParameterStore {
    state: Mutex<State>,
    denied_keys: HashSet<String>,
}

impl MemoryParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call that needs `key_id` fail with [`StoreError::KeyAccess`].
    pub fn with_denied_key(mut self, key_id: impl Into<String>) -> Self {
        self.denied_keys.insert(key_id.into());
        self
    }

    /// Writes a parameter directly, bypassing call recording. Bumps the
    /// version if it already exists.
    pub fn seed(&self, name: &str, value: &str, key_id: &str) {
        let mut state = self.lock();
        let version = state.parameters.get(name).map_or(1, |p| p.version + 1);
        state.parameters.insert(
            name.to_string(),
            StoredParameter {
                value: SecretValue::new(value),
                key_id: key_id.to_string(),
                version,
            },
        );
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().parameters.contains_key(name)
    }

    pub fn value_of(&self, name: &str) -> Option<String> {
        self.lock()
            .parameters
            .get(name)
            .map(|p| p.value.expose().to_string())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // a poisoned lock only means another test thread panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_key(&self, name: &str, key_id: &str) -> Result<(), StoreError> {
        if self.denied_keys.contains(key_id) {
            return Err(StoreError::KeyAccess {
                name: name.to_string(),
                message: format!("access to KMS key '{key_id}' is denied"),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn put_parameter(
        &self,
        input: &PutParameterInput,
    ) -> Result<PutParameterOutput, StoreError> {
        let overwrite = input.overwrite.unwrap_or(false);
        let mut state = self.lock();
        state.calls.push(RecordedCall::Put {
            name: input.name.clone(),
            key_id: input.key_id.clone(),
            overwrite,
        });
        self.check_key(&input.name, &input.key_id)?;

        let version = match state.parameters.get(&input.name) {
            Some(_) if !overwrite => {
                return Err(StoreError::ParameterAlreadyExists(input.name.clone()));
            }
            Some(existing) => existing.version + 1,
            None => 1,
        };
        state.parameters.insert(
            input.name.clone(),
            StoredParameter {
                value: input.value.clone(),
                key_id: input.key_id.clone(),
                version,
            },
        );

        Ok(PutParameterOutput {
            version,
            tier: Some("Standard".to_string()),
        })
    }

    async fn delete_parameter(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::Delete {
            name: name.to_string(),
        });
        state
            .parameters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::ParameterNotFound(name.to_string()))
    }

    async fn get_parameter(
        &self,
        input: &GetParameterInput,
    ) -> Result<ParameterRecord, StoreError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::Get {
            name: input.name.clone(),
            with_decryption: input.with_decryption,
        });
        let stored = state
            .parameters
            .get(&input.name)
            .cloned()
            .ok_or_else(|| StoreError::ParameterNotFound(input.name.clone()))?;

        let value = if input.with_decryption {
            self.check_key(&input.name, &stored.key_id)?;
            stored.value
        } else {
            SecretValue::new(format!("ciphertext:{}:v{}", stored.key_id, stored.version))
        };

        Ok(ParameterRecord {
            name: input.name.clone(),
            parameter_type: "SecureString".to_string(),
            value,
            version: stored.version,
            arn: None,
        })
    }
}
