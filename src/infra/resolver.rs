use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::config::ProvisioningConfig;
use super::error::ResolveError;

/// Tenant and subscription of the signed-in CLI session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub tenant_id: String,
    pub subscription_id: String,
}

/// Source of fallback account identifiers.
#[async_trait]
pub trait AccountInfoSource: Send + Sync {
    async fn resolve_account_info(&self) -> Result<AccountInfo, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct AccountShowOutput {
    #[serde(default)]
    id: String,
    #[serde(rename = "tenantId", default)]
    tenant_id: String,
}

/// Parse the JSON printed by `az account show`.
pub fn parse_account_show(output: &[u8]) -> Result<AccountInfo, ResolveError> {
    let parsed: AccountShowOutput = serde_json::from_slice(output)
        .map_err(|e| ResolveError::MalformedResponse(e.to_string()))?;

    if parsed.id.is_empty() || parsed.tenant_id.is_empty() {
        return Err(ResolveError::MalformedResponse(
            "missing 'id' or 'tenantId'".to_string(),
        ));
    }

    Ok(AccountInfo {
        tenant_id: parsed.tenant_id,
        subscription_id: parsed.id,
    })
}

/// Reads the current account from the local Azure CLI.
pub struct AzureCliAccount {
    program: String,
}

impl AzureCliAccount {
    pub fn new() -> Self {
        Self::with_program("az")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AzureCliAccount {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountInfoSource for AzureCliAccount {
    async fn resolve_account_info(&self) -> Result<AccountInfo, ResolveError> {
        debug!("Running: {} account show --output json", self.program);

        let output = Command::new(&self.program)
            .args(["account", "show", "--output", "json"])
            .output()
            .await
            .map_err(|e| {
                ResolveError::ExternalToolUnavailable(format!("failed to run '{}': {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::ExternalToolUnavailable(format!(
                "'{} account show' exited with code {:?}: {}",
                self.program,
                output.status.code(),
                stderr.trim()
            )));
        }

        parse_account_show(&output.stdout)
    }
}

/// Fill in a blank tenant or subscription from `source`.
///
/// Makes no call when both are already set. Identifiers the operator supplied
/// are never overwritten.
pub async fn resolve_config(
    config: &mut ProvisioningConfig,
    source: &dyn AccountInfoSource,
) -> Result<(), ResolveError> {
    if config.has_account_ids() {
        return Ok(());
    }

    debug!("No tenant and/or subscription ID provided - sourcing them from the Azure CLI");
    let info = source.resolve_account_info().await?;

    if config.tenant_id.is_empty() {
        config.tenant_id = info.tenant_id;
    }
    if config.subscription_id.is_empty() {
        config.subscription_id = info.subscription_id;
    }

    info!(
        tenant = %config.tenant_id,
        subscription = %config.subscription_id,
        "Resolved Azure account"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        calls: AtomicUsize,
        response: Result<AccountInfo, ResolveError>,
    }

    impl StubSource {
        fn returning(response: Result<AccountInfo, ResolveError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccountInfoSource for StubSource {
        async fn resolve_account_info(&self) -> Result<AccountInfo, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn cli_account() -> AccountInfo {
        AccountInfo {
            tenant_id: "cli-tenant".to_string(),
            subscription_id: "cli-sub".to_string(),
        }
    }

    #[tokio::test]
    async fn complete_config_makes_no_call() {
        let source = StubSource::returning(Ok(cli_account()));
        let mut config = ProvisioningConfig {
            tenant_id: "t".to_string(),
            subscription_id: "s".to_string(),
            ..Default::default()
        };
        let before = config.clone();

        resolve_config(&mut config, &source).await.unwrap();

        assert_eq!(source.calls(), 0);
        assert_eq!(config, before);
    }

    #[tokio::test]
    async fn blank_ids_are_filled_from_cli() {
        let source = StubSource::returning(Ok(cli_account()));
        let mut config = ProvisioningConfig::default();

        resolve_config(&mut config, &source).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(config.tenant_id, "cli-tenant");
        assert_eq!(config.subscription_id, "cli-sub");
    }

    #[tokio::test]
    async fn operator_supplied_tenant_is_kept() {
        let source = StubSource::returning(Ok(cli_account()));
        let mut config = ProvisioningConfig {
            tenant_id: "mine".to_string(),
            ..Default::default()
        };

        resolve_config(&mut config, &source).await.unwrap();

        assert_eq!(config.tenant_id, "mine");
        assert_eq!(config.subscription_id, "cli-sub");
    }

    #[tokio::test]
    async fn source_failure_is_propagated() {
        let source = StubSource::returning(Err(ResolveError::ExternalToolUnavailable(
            "not logged in".to_string(),
        )));
        let mut config = ProvisioningConfig::default();

        let err = resolve_config(&mut config, &source).await.unwrap_err();

        assert!(matches!(err, ResolveError::ExternalToolUnavailable(_)));
        assert!(config.subscription_id.is_empty());
    }

    #[test]
    fn parses_account_show_output() {
        let json = br#"{"environmentName":"AzureCloud","id":"sub-1","isDefault":true,"tenantId":"tenant-1"}"#;
        let info = parse_account_show(json).unwrap();
        assert_eq!(info.subscription_id, "sub-1");
        assert_eq!(info.tenant_id, "tenant-1");
    }

    #[test]
    fn non_json_output_is_malformed() {
        let err = parse_account_show(b"Please run 'az login' to setup account.").unwrap_err();
        assert!(matches!(err, ResolveError::MalformedResponse(_)));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = parse_account_show(br#"{"id":"sub-1"}"#).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let source = AzureCliAccount::with_program("actlabs-test-no-such-az-binary");
        let err = source.resolve_account_info().await.unwrap_err();
        assert!(matches!(err, ResolveError::ExternalToolUnavailable(_)));
    }
}
