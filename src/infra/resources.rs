use async_trait::async_trait;

use super::error::RemoteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    pub location: String,
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccount {
    pub id: String,
    pub name: String,
    pub provisioning_state: Option<String>,
}

/// Management-plane operations the provisioning stages perform.
///
/// All of them are create-or-update: calling twice with the same arguments
/// leaves the same resource behind.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn create_or_update_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup, RemoteError>;

    async fn create_storage_account(
        &self,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> Result<StorageAccount, RemoteError>;

    /// Succeeds when an identical assignment already exists.
    async fn create_role_assignment(
        &self,
        scope: &str,
        assignment_name: &str,
        principal_id: &str,
        role_definition_id: &str,
    ) -> Result<(), RemoteError>;
}
