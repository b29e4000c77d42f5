//! Azure Resource Manager REST client.
//!
//! Covers the handful of management-plane calls provisioning needs: resource
//! group and storage account create-or-update, role assignment listing and
//! creation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::authz::{RoleAssignmentPage, RoleAssignmentRecord, RoleAssignmentSource};
use super::credential::TokenCredential;
use super::error::RemoteError;
use super::resources::{ResourceGroup, ResourceManager, StorageAccount};

const RESOURCES_API_VERSION: &str = "2021-04-01";
const STORAGE_API_VERSION: &str = "2023-01-01";
const AUTHORIZATION_API_VERSION: &str = "2022-04-01";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MAX_POLLS: u32 = 60;

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    error: Option<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentListResult {
    #[serde(default)]
    value: Vec<RoleAssignmentItem>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentItem {
    properties: RoleAssignmentProperties,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentProperties {
    #[serde(rename = "principalId", default)]
    principal_id: String,
    #[serde(rename = "roleDefinitionId", default)]
    role_definition_id: String,
}

#[derive(Debug, Deserialize)]
struct ResourceBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    properties: Option<ProvisioningProperties>,
}

#[derive(Debug, Deserialize)]
struct ProvisioningProperties {
    #[serde(rename = "provisioningState")]
    provisioning_state: Option<String>,
}

impl ResourceBody {
    fn provisioning_state(&self) -> Option<String> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.clone())
    }
}

pub struct ArmClient {
    client: reqwest::Client,
    endpoint: String,
    scope: String,
    credential: Arc<dyn TokenCredential>,
    poll_interval: Duration,
    max_polls: u32,
}

impl ArmClient {
    pub fn new(
        endpoint: impl Into<String>,
        scope: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            scope: scope.into(),
            credential,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    /// Send an authenticated request; non-2xx responses become `RemoteError::Api`.
    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response, RemoteError> {
        let token = self
            .credential
            .get_token(&self.scope)
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        debug!("{method} {url}");
        let mut request = self.client.request(method, url).bearer_auth(&token.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(api_error(response).await)
    }

    /// Follow an async operation's `Location` header until it stops returning 202.
    async fn poll_until_done(&self, mut response: Response) -> Result<Response, RemoteError> {
        let mut polls = 0;
        while response.status() == StatusCode::ACCEPTED {
            if polls >= self.max_polls {
                return Err(RemoteError::Transport(format!(
                    "operation still running after {polls} polls"
                )));
            }
            let location = header_str(&response, "location").ok_or_else(|| {
                RemoteError::Decode("202 response without a Location header".to_string())
            })?;
            let wait = header_str(&response, "retry-after")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(self.poll_interval)
                .min(self.poll_interval.max(Duration::from_secs(1)) * 5);

            tokio::time::sleep(wait).await;
            polls += 1;
            response = self.send(Method::GET, &location, None).await?;
        }
        Ok(response)
    }
}

fn header_str(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn api_error(response: Response) -> RemoteError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ArmErrorBody>(&text) {
        Ok(ArmErrorBody {
            error: Some(detail),
        }) => RemoteError::Api {
            status,
            code: detail.code,
            message: detail.message,
        },
        _ => RemoteError::Api {
            status,
            code: String::new(),
            message: text,
        },
    }
}

#[async_trait]
impl RoleAssignmentSource for ArmClient {
    async fn list_page(
        &self,
        subscription_id: &str,
        next_link: Option<&str>,
    ) -> Result<RoleAssignmentPage, RemoteError> {
        let url = match next_link {
            Some(link) => link.to_string(),
            None => self.url(
                &format!("/subscriptions/{subscription_id}/providers/Microsoft.Authorization/roleAssignments"),
                AUTHORIZATION_API_VERSION,
            ),
        };

        let result: RoleAssignmentListResult = self.send(Method::GET, &url, None).await?.json().await?;
        Ok(RoleAssignmentPage {
            assignments: result
                .value
                .into_iter()
                .map(|item| RoleAssignmentRecord {
                    principal_id: item.properties.principal_id,
                    role_definition_id: item.properties.role_definition_id,
                })
                .collect(),
            next_link: result.next_link,
        })
    }
}

#[async_trait]
impl ResourceManager for ArmClient {
    async fn create_or_update_resource_group(
        &self,
        subscription_id: &str,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroup, RemoteError> {
        let url = self.url(
            &format!("/subscriptions/{subscription_id}/resourcegroups/{name}"),
            RESOURCES_API_VERSION,
        );
        let body = json!({ "location": location });

        let rg: ResourceBody = self.send(Method::PUT, &url, Some(&body)).await?.json().await?;
        let provisioning_state = rg.provisioning_state();
        info!(id = %rg.id, "Resource group ready");
        Ok(ResourceGroup {
            id: rg.id,
            name: rg.name,
            location: rg.location,
            provisioning_state,
        })
    }

    async fn create_storage_account(
        &self,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        location: &str,
    ) -> Result<StorageAccount, RemoteError> {
        let url = self.url(
            &format!(
                "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{name}"
            ),
            STORAGE_API_VERSION,
        );
        let body = json!({
            "location": location,
            "kind": "StorageV2",
            "sku": { "name": "Standard_LRS" },
            "properties": {
                "minimumTlsVersion": "TLS1_2",
                "allowBlobPublicAccess": false,
                "supportsHttpsTrafficOnly": true
            }
        });

        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        let response = self.poll_until_done(response).await?;

        // Completed async operations may answer with an empty body
        let text = response.text().await?;
        let account = if text.trim().is_empty() {
            StorageAccount {
                id: format!(
                    "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{name}"
                ),
                name: name.to_string(),
                provisioning_state: None,
            }
        } else {
            let body: ResourceBody =
                serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))?;
            let provisioning_state = body.provisioning_state();
            StorageAccount {
                id: body.id,
                name: body.name,
                provisioning_state,
            }
        };
        info!(id = %account.id, "Storage account ready");
        Ok(account)
    }

    async fn create_role_assignment(
        &self,
        scope: &str,
        assignment_name: &str,
        principal_id: &str,
        role_definition_id: &str,
    ) -> Result<(), RemoteError> {
        let url = self.url(
            &format!("{scope}/providers/Microsoft.Authorization/roleAssignments/{assignment_name}"),
            AUTHORIZATION_API_VERSION,
        );
        let body = json!({
            "properties": {
                "roleDefinitionId": role_definition_id,
                "principalId": principal_id,
                "principalType": "User"
            }
        });

        match self.send(Method::PUT, &url, Some(&body)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict("RoleAssignmentExists") => {
                debug!("Role assignment already exists at {scope}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
