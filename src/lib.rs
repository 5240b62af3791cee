pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod infra;
pub mod key;
pub mod parameter;
pub mod policy;
pub mod resource;
pub mod template;

pub use context::StackContext;
pub use error::{ProvisionError, StoreError};
pub use handler::{ActionOutcome, CustomResourceHandler, LifecycleEvent, RequestType};
pub use key::{KeyReference, KmsKey};
pub use parameter::{SecureStringParameter, SecureStringParameterProps, SecureStringValue};
pub use resource::{CustomResource, RemovalPolicy, ResponseFieldRef};
