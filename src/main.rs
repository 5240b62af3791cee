//! CLI entry point for declaring and running secure string parameters.
//!
//! Provides subcommands to render the declared resources as a template, run
//! their create/update and delete actions against SSM, and read a value back.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use secure_string_parameter::config::DeploymentConfig;
use secure_string_parameter::infra::{MemoryParameterStore, ParameterStore, SsmParameterStore};
use secure_string_parameter::template::Template;
use secure_string_parameter::{CustomResourceHandler, LifecycleEvent, SecureStringParameter};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "secure-string-parameter")]
#[command(about = "Declare and provision SSM SecureString parameters", long_about = None)]
struct Cli {
    /// JSON file declaring parameters and readers
    #[arg(short, long, global = true, default_value = "stack.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the declared resources as a CloudFormation-style template
    Synth {
        /// Write the template here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Run create (or update) for every parameter, then every reader
    Deploy {
        /// Send update events, overwriting existing parameters
        #[arg(long, default_value_t = false)]
        update: bool,

        /// Rehearse against an in-memory store instead of SSM
        #[arg(long, default_value_t = false)]
        local: bool,
    },
    /// Run delete for every parameter, honouring removal policies
    Destroy {
        /// Rehearse against an in-memory store instead of SSM
        #[arg(long, default_value_t = false)]
        local: bool,
    },
    /// Read and decrypt a parameter, printing the value to stdout
    Read {
        /// Parameter name, e.g. /app/db/password
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/secure_string_parameter.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("secure_string_parameter.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth { output } => {
            let config = DeploymentConfig::load(&cli.config)?;
            synth(&config, output.as_deref())?
        }
        Commands::Deploy { update, local } => {
            let config = DeploymentConfig::load(&cli.config)?;
            deploy(&config, store(local).await, update).await?;
        }
        Commands::Destroy { local } => {
            let config = DeploymentConfig::load(&cli.config)?;
            destroy(&config, store(local).await).await?;
        }
        Commands::Read { name } => {
            // region and account can come from the environment alone
            let config = DeploymentConfig::load_or_default(&cli.config)?;
            let ctx = config.stack_context()?;
            let reader =
                SecureStringParameter::value_for_secure_string_parameter(&ctx, "Cli", &name)?;
            let handler = CustomResourceHandler::new(ssm_store().await);
            let outcome = handler
                .handle(reader.resource(), &LifecycleEvent::create())
                .await?;
            let field = reader.value().field();
            let value = reader
                .value()
                .resolve(&outcome)
                .with_context(|| format!("no {field} in response for '{name}'"))?;
            println!("{value}");
        }
    }

    Ok(())
}

/// In-memory store for `--local` rehearsals, SSM otherwise.
async fn store(local: bool) -> Arc<dyn ParameterStore> {
    if local {
        warn!("Running against an in-memory store, nothing reaches SSM");
        Arc::new(MemoryParameterStore::new())
    } else {
        ssm_store().await
    }
}

/// Builds an SSM-backed store from the ambient AWS configuration.
/// `SSM_ENDPOINT_URL` redirects calls to a local emulator.
async fn ssm_store() -> Arc<dyn ParameterStore> {
    let config = aws_config::load_from_env().await;
    match std::env::var("SSM_ENDPOINT_URL") {
        Ok(endpoint) if !endpoint.trim().is_empty() => {
            info!(endpoint = %endpoint, "Using custom SSM endpoint");
            Arc::new(SsmParameterStore::with_endpoint(&config, &endpoint))
        }
        _ => Arc::new(SsmParameterStore::new(&config)),
    }
}

#[tracing::instrument(skip(config))]
fn synth(config: &DeploymentConfig, output: Option<&str>) -> Result<()> {
    let ctx = config.stack_context()?;
    let parameters = config.build_parameters(&ctx)?;
    let readers = config.build_readers(&ctx)?;

    let resources = parameters
        .iter()
        .map(SecureStringParameter::resource)
        .chain(readers.iter().map(|r| r.resource()));
    let mut template = Template::from_resources(resources, Utc::now());
    for reader in &readers {
        let name = format!("{}Value", reader.value().logical_id());
        template.add_output(&name, reader.value().to_cfn());
    }

    let rendered = template.to_string_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write '{path}'"))?;
            info!(path, "Template written");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

/// Parameters go first so readers of the same name see the written value.
#[tracing::instrument(skip(config, store))]
async fn deploy(
    config: &DeploymentConfig,
    store: Arc<dyn ParameterStore>,
    update: bool,
) -> Result<()> {
    let ctx = config.stack_context()?;
    let parameters = config.build_parameters(&ctx)?;
    let readers = config.build_readers(&ctx)?;
    let handler = CustomResourceHandler::new(store);

    let resources = parameters
        .iter()
        .map(SecureStringParameter::resource)
        .chain(readers.iter().map(|r| r.resource()));
    for resource in resources {
        let event = if update {
            LifecycleEvent::update(resource.logical_id())
        } else {
            LifecycleEvent::create()
        };
        let outcome = handler.handle(resource, &event).await?;
        info!(
            logical_id = resource.logical_id(),
            physical_resource_id = %outcome.physical_resource_id,
            version = outcome
                .data
                .get("Version")
                .or_else(|| outcome.data.get("Parameter.Version"))
                .map(String::as_str),
            "Resource deployed"
        );
    }

    info!(
        parameters = parameters.len(),
        readers = readers.len(),
        "Deploy finished"
    );
    Ok(())
}

#[tracing::instrument(skip(config, store))]
async fn destroy(config: &DeploymentConfig, store: Arc<dyn ParameterStore>) -> Result<()> {
    let ctx = config.stack_context()?;
    let parameters = config.build_parameters(&ctx)?;
    let handler = CustomResourceHandler::new(store);

    for parameter in &parameters {
        let resource = parameter.resource();
        let outcome = handler
            .handle(resource, &LifecycleEvent::delete(resource.logical_id()))
            .await?;
        info!(
            logical_id = resource.logical_id(),
            parameter = parameter.parameter_name(),
            deleted = outcome.invoked.is_some(),
            "Resource torn down"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secure_string_parameter::infra::RecordedCall;

    const CONFIG: &str = r#"{
        "region": "eu-west-1",
        "accountId": "123456789012",
        "parameters": [
            { "id": "Db", "name": "/app/db/password", "value": "s3cr3t", "keyId": "abc" },
            { "id": "Kept", "name": "/app/kept", "value": "v", "keyId": "abc",
              "removalPolicy": "retain" }
        ]
    }"#;

    #[test]
    fn test_destroy_accepts_local_flag() {
        let cli = Cli::try_parse_from(["secure-string-parameter", "destroy", "--local"]).unwrap();
        assert!(matches!(cli.command, Commands::Destroy { local: true }));

        let cli = Cli::try_parse_from(["secure-string-parameter", "destroy"]).unwrap();
        assert!(matches!(cli.command, Commands::Destroy { local: false }));
    }

    #[tokio::test]
    async fn test_destroy_deletes_only_destroyable_parameters() {
        let config = DeploymentConfig::from_json(CONFIG).unwrap();
        let memory = Arc::new(MemoryParameterStore::new());
        memory.seed("/app/db/password", "s3cr3t", "abc");
        memory.seed("/app/kept", "v", "abc");

        destroy(&config, memory.clone()).await.unwrap();

        assert_eq!(
            memory.calls(),
            vec![RecordedCall::Delete {
                name: "/app/db/password".to_string()
            }]
        );
        assert!(memory.contains("/app/kept"));
    }

    #[tokio::test]
    async fn test_local_deploy_then_destroy() {
        let config = DeploymentConfig::from_json(CONFIG).unwrap();
        let memory = Arc::new(MemoryParameterStore::new());

        deploy(&config, memory.clone(), false).await.unwrap();
        assert!(memory.contains("/app/db/password"));

        destroy(&config, memory.clone()).await.unwrap();
        assert!(!memory.contains("/app/db/password"));
        assert!(memory.contains("/app/kept"));
    }
}
