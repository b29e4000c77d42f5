use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;
use crate::infra::ProvisioningConfig;
use crate::infra::config::DEFAULT_LOCATION;

#[derive(Parser, Debug)]
#[command(name = "actlabs")]
#[command(author, version, about = "Provision the Azure infrastructure behind ACTLabs")]
pub struct Cli {
    /// Path to settings file (default: ~/.config/actlabs/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Simulate all stages without touching Azure or Docker
    #[arg(long, global = true)]
    pub dryrun: bool,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the resource group, storage and role assignments, then start the server locally
    Setup(SetupArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    /// Name of the resource group to create
    #[arg(short = 'g', long)]
    pub resource_group: Option<String>,

    /// Azure region for the resources
    #[arg(short = 'l', long)]
    pub location: Option<String>,

    /// Azure AD tenant ID
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Azure subscription ID
    #[arg(short = 's', long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Collect the values through the setup wizard
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub interactive: bool,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SetupArgs {
    /// Merge flags (and their environment fallbacks) over the settings file.
    ///
    /// Identifiers nobody supplied stay blank for the account resolver.
    pub fn provisioning_config(&self, settings: &Settings) -> ProvisioningConfig {
        let azure = &settings.azure;

        let resource_group = non_blank(self.resource_group.as_ref())
            .or_else(|| non_blank(Some(&azure.resource_group)))
            .unwrap_or_else(|| ProvisioningConfig::default().resource_group_name);
        let location = non_blank(self.location.as_ref())
            .or_else(|| non_blank(Some(&azure.location)))
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());

        ProvisioningConfig {
            tenant_id: non_blank(self.tenant_id.as_ref())
                .or_else(|| non_blank(azure.tenant_id.as_ref()))
                .unwrap_or_default(),
            subscription_id: non_blank(self.subscription_id.as_ref())
                .or_else(|| non_blank(azure.subscription_id.as_ref()))
                .unwrap_or_default(),
            location,
            resource_group_name: resource_group,
            storage_account_name: non_blank(azure.storage_account.as_ref()).unwrap_or_default(),
            local: settings.local_deployment(),
            ..Default::default()
        }
    }
}
