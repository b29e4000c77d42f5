use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::error::{ActlabsError, Result};
use crate::infra::{ProvisionEvent, ProvisioningConfig, STAGES, StageExecutor, start_provisioning};

/// Run every stage without a terminal UI, logging each transition.
///
/// Returns the config as the stages left it (resolved IDs, operator identity).
pub async fn run(
    executor: Arc<dyn StageExecutor>,
    config: ProvisioningConfig,
    stage_timeout: Option<Duration>,
) -> Result<ProvisioningConfig> {
    info!(
        resource_group = %config.resource_group_name,
        location = %config.location,
        "Starting non-interactive setup"
    );

    let (mut events, handle) = start_provisioning(executor, config, stage_timeout);
    let mut outcome = None;

    while let Some(event) = events.recv().await {
        match event {
            ProvisionEvent::StageStarted(stage) => {
                info!(
                    stage = stage.short_name(),
                    "[{}/{}] {}",
                    stage.index() + 1,
                    STAGES.len(),
                    stage.label()
                );
            }
            ProvisionEvent::StageSucceeded(stage) => {
                info!(stage = stage.short_name(), "done");
            }
            ProvisionEvent::StageFailed(stage, reason) => {
                error!(stage = stage.short_name(), "{reason}");
            }
            ProvisionEvent::Finished(result) => outcome = Some(result),
        }
    }

    let config = handle
        .await
        .map_err(|e| ActlabsError::Aborted(e.to_string()))?;
    match outcome {
        Some(Ok(())) => Ok(config),
        Some(Err(e)) => Err(e.into()),
        None => Err(ActlabsError::Aborted(
            "provisioning ended without a result".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{DryrunStages, LocalRuntimeError, Stage, StageError};
    use async_trait::async_trait;

    struct FailingAt(Stage);

    #[async_trait]
    impl StageExecutor for FailingAt {
        async fn execute(
            &self,
            stage: Stage,
            _config: &mut ProvisioningConfig,
        ) -> std::result::Result<(), StageError> {
            if stage == self.0 {
                Err(StageError::Local(LocalRuntimeError::CommandFailed {
                    command: "docker run".to_string(),
                    stderr: "docker is not running".to_string(),
                }))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn dryrun_completes_and_fills_identity() {
        let executor = Arc::new(DryrunStages::with_delay(Duration::ZERO));
        let config = run(executor, ProvisioningConfig::default(), None).await.unwrap();

        assert!(config.has_account_ids());
        assert_eq!(config.operator_upn, "operator@example.com");
        assert!(config.storage_account_name.starts_with("actlabs"));
    }

    #[tokio::test]
    async fn failure_names_the_stage() {
        let executor = Arc::new(FailingAt(Stage::DeployLocal));
        let err = run(executor, ProvisioningConfig::default(), None).await.unwrap_err();

        match err {
            ActlabsError::Provision(e) => {
                assert_eq!(e.stage(), Stage::DeployLocal);
                assert!(e.to_string().contains("docker is not running"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
