use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::arm::ArmClient;
use super::authz::{
    RoleAssignmentSource, blob_data_contributor_role_definition_id, ensure_owner,
    role_assignment_name,
};
use super::config::{Endpoints, ProvisioningConfig};
use super::credential::{ChainedCredential, TokenCredential};
use super::error::{IdentityError, StageError};
use super::graph::{DirectoryService, GraphClient};
use super::local::{DockerRuntime, LocalRuntime};
use super::resolver::{AccountInfoSource, AzureCliAccount, resolve_config};
use super::resources::ResourceManager;
use super::sequencer::StageExecutor;
use super::stage::Stage;

const DRYRUN_STAGE_DELAY: Duration = Duration::from_millis(600);

/// Stages backed by Azure and the local container runtime.
pub struct AzureStages {
    pub account: Arc<dyn AccountInfoSource>,
    pub credential: Arc<dyn TokenCredential>,
    pub directory: Arc<dyn DirectoryService>,
    pub authorization: Arc<dyn RoleAssignmentSource>,
    pub resources: Arc<dyn ResourceManager>,
    pub local: Arc<dyn LocalRuntime>,
    /// Scope requested when proving the credential works
    pub token_scope: String,
}

impl AzureStages {
    /// Live clients talking to `endpoints`.
    pub fn live(endpoints: &Endpoints, tenant_hint: Option<String>) -> Self {
        let credential: Arc<dyn TokenCredential> =
            Arc::new(ChainedCredential::default_chain(&endpoints.authority, tenant_hint));
        let arm = Arc::new(ArmClient::new(
            endpoints.resource_manager.clone(),
            endpoints.resource_manager_scope(),
            credential.clone(),
        ));
        let graph = Arc::new(GraphClient::new(
            endpoints.graph.clone(),
            endpoints.graph_scope(),
            credential.clone(),
        ));

        Self {
            account: Arc::new(AzureCliAccount::new()),
            credential,
            directory: graph,
            authorization: arm.clone(),
            resources: arm,
            local: Arc::new(DockerRuntime::new()),
            token_scope: endpoints.resource_manager_scope(),
        }
    }

    async fn authenticate(&self, config: &mut ProvisioningConfig) -> Result<(), StageError> {
        resolve_config(config, self.account.as_ref()).await?;

        self.credential.get_token(&self.token_scope).await?;

        let principal = self.directory.signed_in_principal().await?;
        info!(user = %principal.user_principal_name, "Signed in");

        config.operator_upn = principal.user_principal_name;
        config.operator_principal_id = principal.object_id;
        Ok(())
    }

    async fn check_owner(&self, config: &ProvisioningConfig) -> Result<(), StageError> {
        if config.operator_principal_id.is_empty() {
            return Err(IdentityError::UnknownPrincipal.into());
        }
        info!("Checking access levels on the subscription to ensure the right permissions are in place");
        ensure_owner(
            self.authorization.as_ref(),
            &config.subscription_id,
            &config.operator_principal_id,
            &config.operator_upn,
        )
        .await?;
        Ok(())
    }

    async fn assign_blob_role(&self, config: &ProvisioningConfig) -> Result<(), StageError> {
        let scope = config.storage_account_id();
        let role = blob_data_contributor_role_definition_id(&config.subscription_id);
        let name = role_assignment_name(&scope, &config.operator_principal_id, &role);
        debug!(%scope, %name, "Assigning Storage Blob Data Contributor");

        self.resources
            .create_role_assignment(&scope, &name, &config.operator_principal_id, &role)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StageExecutor for AzureStages {
    async fn execute(&self, stage: Stage, config: &mut ProvisioningConfig) -> Result<(), StageError> {
        match stage {
            Stage::AzureAuth => self.authenticate(config).await,
            Stage::EnsureOwner => self.check_owner(config).await,
            Stage::CreateResourceGroup => {
                self.resources
                    .create_or_update_resource_group(
                        &config.subscription_id,
                        &config.resource_group_name,
                        &config.location,
                    )
                    .await?;
                Ok(())
            }
            Stage::CreateStorage => {
                config.storage_account_name = config.storage_account();
                self.resources
                    .create_storage_account(
                        &config.subscription_id,
                        &config.resource_group_name,
                        &config.storage_account_name,
                        &config.location,
                    )
                    .await?;
                Ok(())
            }
            Stage::AssignBlobDataContributorRole => self.assign_blob_role(config).await,
            Stage::DeployLocal => Ok(self.local.deploy(config).await?),
            Stage::VerifyLocal => Ok(self.local.verify(&config.local).await?),
        }
    }
}

/// Simulates every stage without touching Azure or Docker.
pub struct DryrunStages {
    delay: Duration,
}

impl DryrunStages {
    pub fn new() -> Self {
        Self::with_delay(DRYRUN_STAGE_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for DryrunStages {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageExecutor for DryrunStages {
    async fn execute(&self, stage: Stage, config: &mut ProvisioningConfig) -> Result<(), StageError> {
        tokio::time::sleep(self.delay).await;

        match stage {
            Stage::AzureAuth => {
                if config.tenant_id.is_empty() {
                    config.tenant_id = "00000000-0000-0000-0000-000000000000".to_string();
                }
                if config.subscription_id.is_empty() {
                    config.subscription_id = "00000000-0000-0000-0000-000000000000".to_string();
                }
                config.operator_upn = "operator@example.com".to_string();
                config.operator_principal_id = "00000000-0000-0000-0000-000000000001".to_string();
            }
            Stage::CreateStorage => {
                config.storage_account_name = config.storage_account();
            }
            _ => {}
        }

        info!(stage = stage.short_name(), "Dryrun: simulated");
        Ok(())
    }
}

/// Pick the executor for this run.
pub fn create_executor(
    dryrun: bool,
    endpoints: &Endpoints,
    tenant_hint: Option<String>,
) -> Arc<dyn StageExecutor> {
    if dryrun {
        Arc::new(DryrunStages::new())
    } else {
        Arc::new(AzureStages::live(endpoints, tenant_hint))
    }
}
