pub const DEFAULT_RESOURCE_GROUP: &str = "repro-project";
pub const DEFAULT_LOCATION: &str = "eastus2";

pub const RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";
pub const GRAPH_ENDPOINT: &str = "https://graph.microsoft.com";
pub const AUTHORITY_ENDPOINT: &str = "https://login.microsoftonline.com";

/// Everything the provisioning stages need, filled in as the run progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub tenant_id: String,
    pub subscription_id: String,
    pub location: String,
    pub resource_group_name: String,
    pub operator_upn: String,
    pub operator_principal_id: String,
    /// Empty until derived from the subscription (or set explicitly)
    pub storage_account_name: String,
    pub local: LocalDeployment,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            subscription_id: String::new(),
            location: DEFAULT_LOCATION.to_string(),
            resource_group_name: DEFAULT_RESOURCE_GROUP.to_string(),
            operator_upn: String::new(),
            operator_principal_id: String::new(),
            storage_account_name: String::new(),
            local: LocalDeployment::default(),
        }
    }
}

impl ProvisioningConfig {
    pub fn has_account_ids(&self) -> bool {
        !self.tenant_id.is_empty() && !self.subscription_id.is_empty()
    }

    /// Storage account name, deriving one from the subscription if none was set.
    ///
    /// Storage account names are global, 3-24 characters, lowercase letters and
    /// digits only.
    pub fn storage_account(&self) -> String {
        if !self.storage_account_name.is_empty() {
            return self.storage_account_name.clone();
        }
        let suffix: String = self
            .subscription_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .take(17)
            .collect();
        format!("actlabs{suffix}")
    }

    pub fn resource_group_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group_name
        )
    }

    pub fn storage_account_id(&self) -> String {
        format!(
            "{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.resource_group_id(),
            self.storage_account()
        )
    }
}

/// How the ACTLabs server container is run on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDeployment {
    pub image: String,
    pub container_name: String,
    pub host_port: u16,
    pub container_port: u16,
    pub health_path: String,
    pub verify_attempts: u32,
}

impl Default for LocalDeployment {
    fn default() -> Self {
        Self {
            image: "actlabs-server:latest".to_string(),
            container_name: "actlabs-server".to_string(),
            host_port: 8880,
            container_port: 80,
            health_path: "/status".to_string(),
            verify_attempts: 15,
        }
    }
}

impl LocalDeployment {
    pub fn health_url(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.host_port, self.health_path)
    }
}

/// Remote endpoints used by the live clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub resource_manager: String,
    pub graph: String,
    pub authority: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            resource_manager: RESOURCE_MANAGER_ENDPOINT.to_string(),
            graph: GRAPH_ENDPOINT.to_string(),
            authority: AUTHORITY_ENDPOINT.to_string(),
        }
    }
}

impl Endpoints {
    pub fn resource_manager_scope(&self) -> String {
        format!("{}/.default", self.resource_manager.trim_end_matches('/'))
    }

    pub fn graph_scope(&self) -> String {
        format!("{}/.default", self.graph.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_storage_account_name_is_valid() {
        let config = ProvisioningConfig {
            subscription_id: "0F1E2D3C-4B5A-6978-8796-A5B4C3D2E1F0".to_string(),
            ..Default::default()
        };
        let name = config.storage_account();
        assert_eq!(name, "actlabs0f1e2d3c4b5a69788");
        assert!((3..=24).contains(&name.len()));
        assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn explicit_storage_account_name_wins() {
        let config = ProvisioningConfig {
            subscription_id: "sub".to_string(),
            storage_account_name: "mylabs".to_string(),
            ..Default::default()
        };
        assert_eq!(config.storage_account(), "mylabs");
        assert_eq!(
            config.storage_account_id(),
            "/subscriptions/sub/resourceGroups/repro-project/providers/Microsoft.Storage/storageAccounts/mylabs"
        );
    }

    #[test]
    fn scopes_ignore_trailing_slash() {
        let endpoints = Endpoints {
            resource_manager: "https://management.azure.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            endpoints.resource_manager_scope(),
            "https://management.azure.com/.default"
        );
    }
}
