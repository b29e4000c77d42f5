use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::credential::TokenCredential;
use super::error::IdentityError;

/// The signed-in operator as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_principal_name: String,
    pub object_id: String,
}

#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn signed_in_principal(&self) -> Result<Principal, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    id: Option<String>,
    #[serde(rename = "userPrincipalName")]
    user_principal_name: Option<String>,
}

/// Microsoft Graph `/me` lookup.
pub struct GraphClient {
    client: reqwest::Client,
    endpoint: String,
    scope: String,
    credential: Arc<dyn TokenCredential>,
}

impl GraphClient {
    pub fn new(
        endpoint: impl Into<String>,
        scope: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            scope: scope.into(),
            credential,
        }
    }
}

#[async_trait]
impl DirectoryService for GraphClient {
    async fn signed_in_principal(&self) -> Result<Principal, IdentityError> {
        let token = self.credential.get_token(&self.scope).await?;

        let url = format!("{}/v1.0/me", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("$select", "id,userPrincipalName")])
            .bearer_auth(&token.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let me: MeResponse = response.json().await?;
        let object_id = me
            .id
            .filter(|id| !id.is_empty())
            .ok_or(IdentityError::MissingField("id"))?;
        let user_principal_name = me
            .user_principal_name
            .filter(|upn| !upn.is_empty())
            .ok_or(IdentityError::MissingField("userPrincipalName"))?;

        Ok(Principal {
            user_principal_name,
            object_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::credential::AccessToken;
    use crate::infra::error::CredentialError;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticToken;

    #[async_trait]
    impl TokenCredential for StaticToken {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
            Ok(AccessToken {
                token: "graph-token".to_string(),
                expires_at: None,
            })
        }
    }

    #[tokio::test]
    async fn reads_upn_and_object_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .and(header("authorization", "Bearer graph-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "00000000-0000-0000-0000-0000000000aa",
                "userPrincipalName": "operator@contoso.com"
            })))
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), "scope", Arc::new(StaticToken));
        let principal = client.signed_in_principal().await.unwrap();

        assert_eq!(principal.user_principal_name, "operator@contoso.com");
        assert_eq!(principal.object_id, "00000000-0000-0000-0000-0000000000aa");
    }

    #[tokio::test]
    async fn service_principal_without_me_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .respond_with(ResponseTemplate::new(400).set_body_string("/me request is only valid with delegated authentication flow."))
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), "scope", Arc::new(StaticToken));
        let err = client.signed_in_principal().await.unwrap_err();

        assert!(matches!(err, IdentityError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn missing_object_id_is_reported_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "userPrincipalName": "operator@contoso.com"
            })))
            .mount(&server)
            .await;

        let client = GraphClient::new(server.uri(), "scope", Arc::new(StaticToken));
        let err = client.signed_in_principal().await.unwrap_err();

        assert_eq!(err, IdentityError::MissingField("id"));
    }
}
