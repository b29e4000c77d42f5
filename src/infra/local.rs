use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::config::{LocalDeployment, ProvisioningConfig};
use super::error::LocalRuntimeError;

const VERIFY_INTERVAL: Duration = Duration::from_secs(2);

/// Runs the ACTLabs server components on this machine.
#[async_trait]
pub trait LocalRuntime: Send + Sync {
    async fn deploy(&self, config: &ProvisioningConfig) -> Result<(), LocalRuntimeError>;

    async fn verify(&self, deployment: &LocalDeployment) -> Result<(), LocalRuntimeError>;
}

/// Environment passed into the server container.
pub fn container_env(config: &ProvisioningConfig) -> Vec<(String, String)> {
    vec![
        ("AZURE_TENANT_ID".to_string(), config.tenant_id.clone()),
        ("AZURE_SUBSCRIPTION_ID".to_string(), config.subscription_id.clone()),
        ("ACTLABS_RESOURCE_GROUP".to_string(), config.resource_group_name.clone()),
        ("ACTLABS_STORAGE_ACCOUNT".to_string(), config.storage_account()),
        ("ACTLABS_USER".to_string(), config.operator_upn.clone()),
    ]
}

/// `docker run` arguments for the server container.
pub fn run_args(config: &ProvisioningConfig) -> Vec<String> {
    let local = &config.local;
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        local.container_name.clone(),
        "-p".to_string(),
        format!("{}:{}", local.host_port, local.container_port),
    ];
    for (key, value) in container_env(config) {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(local.image.clone());
    args
}

pub struct DockerRuntime {
    program: String,
    client: reqwest::Client,
    interval: Duration,
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            interval: VERIFY_INTERVAL,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    async fn docker(&self, args: &[String]) -> Result<String, LocalRuntimeError> {
        debug!("Running: {} {:?}", self.program, args);
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| LocalRuntimeError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(LocalRuntimeError::CommandFailed {
                command: format!(
                    "{} {}",
                    self.program,
                    args.first().map(String::as_str).unwrap_or_default()
                ),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn is_running(&self, container: &str) -> bool {
        let args = [
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Running}}".to_string(),
            container.to_string(),
        ];
        matches!(self.docker(&args).await.as_deref(), Ok("true"))
    }

    async fn is_healthy(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {e}");
                false
            }
        }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalRuntime for DockerRuntime {
    async fn deploy(&self, config: &ProvisioningConfig) -> Result<(), LocalRuntimeError> {
        let name = &config.local.container_name;

        // Replace whatever a previous run left behind
        let remove = ["rm".to_string(), "-f".to_string(), name.clone()];
        if let Err(e) = self.docker(&remove).await {
            debug!("No previous container removed: {e}");
        }

        let id = self.docker(&run_args(config)).await?;
        info!(container = %name, id = %id, "Started ACTLabs server container");
        Ok(())
    }

    async fn verify(&self, deployment: &LocalDeployment) -> Result<(), LocalRuntimeError> {
        let url = deployment.health_url();
        let attempts = deployment.verify_attempts.max(1);

        for attempt in 1..=attempts {
            if self.is_running(&deployment.container_name).await && self.is_healthy(&url).await {
                info!("ACTLabs server is up at {url}");
                return Ok(());
            }
            if attempt < attempts {
                debug!(attempt, "ACTLabs server not ready yet");
                tokio::time::sleep(self.interval).await;
            }
        }

        warn!("ACTLabs server did not become healthy");
        Err(LocalRuntimeError::NotHealthy {
            container: deployment.container_name.clone(),
            url,
            attempts,
        })
    }
}
