use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::error::CredentialError;

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Tokens expiring sooner than this are refreshed.
const EXPIRY_MARGIN: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<SystemTime>,
}

impl AccessToken {
    fn expires_in(token: String, seconds: Option<u64>) -> Self {
        Self {
            token,
            expires_at: seconds.map(|s| SystemTime::now() + Duration::from_secs(s)),
        }
    }

    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => at > SystemTime::now() + EXPIRY_MARGIN,
            // Unknown expiry: don't reuse
            None => false,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Anything that can hand out bearer tokens for a scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// `expires_in` arrives as a number from AAD and as a string from IMDS.
fn seconds_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: serde_json::Value,
}

impl OAuthTokenResponse {
    fn into_token(self) -> AccessToken {
        let seconds = seconds_value(&self.expires_in);
        AccessToken::expires_in(self.access_token, seconds)
    }
}

/// Service principal from `AZURE_TENANT_ID` / `AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET`.
pub struct EnvironmentCredential {
    client: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl EnvironmentCredential {
    pub fn new(
        authority: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            authority: authority.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Returns `None` when the environment does not describe a service principal.
    pub fn from_env(authority: &str) -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Some(Self::new(
            authority,
            var("AZURE_TENANT_ID")?,
            var("AZURE_CLIENT_ID")?,
            var("AZURE_CLIENT_SECRET")?,
        ))
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CredentialError::single(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::single(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::single(format!("invalid token response: {e}")))?;
        Ok(token.into_token())
    }
}

/// Managed identity via the instance metadata service.
pub struct ManagedIdentityCredential {
    client: reqwest::Client,
    endpoint: String,
}

impl ManagedIdentityCredential {
    pub fn new() -> Self {
        Self::with_endpoint(IMDS_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(IMDS_PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for ManagedIdentityCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "managed identity"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("api-version", "2018-02-01"),
                ("resource", scope_to_resource(scope)),
            ])
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| CredentialError::single(format!("metadata endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::single(format!(
                "metadata endpoint returned {status}"
            )));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::single(format!("invalid token response: {e}")))?;
        Ok(token.into_token())
    }
}

#[derive(Debug, Deserialize)]
struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Unix timestamp; only printed by newer CLI versions
    #[serde(default)]
    expires_on: Option<u64>,
}

/// Borrow the token of the signed-in `az` session.
pub struct AzureCliCredential {
    program: String,
    tenant_id: Option<String>,
}

impl AzureCliCredential {
    pub fn new(tenant_id: Option<String>) -> Self {
        Self {
            program: "az".to_string(),
            tenant_id: tenant_id.filter(|t| !t.is_empty()),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure cli"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "account",
            "get-access-token",
            "--output",
            "json",
            "--resource",
            scope_to_resource(scope),
        ]);
        if let Some(ref tenant) = self.tenant_id {
            cmd.args(["--tenant", tenant]);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| CredentialError::single(format!("failed to run '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::single(format!(
                "'{} account get-access-token' failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        let parsed: CliTokenResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| CredentialError::single(format!("invalid CLI token output: {e}")))?;

        let expires_at = parsed
            .expires_on
            .map(|ts| UNIX_EPOCH + Duration::from_secs(ts));
        Ok(AccessToken {
            token: parsed.access_token,
            expires_at,
        })
    }
}

/// Tries each source in order; the first one that works is used from then on.
pub struct ChainedCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    selected: Mutex<Option<usize>>,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            selected: Mutex::new(None),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Environment service principal, then managed identity, then Azure CLI.
    pub fn default_chain(authority: &str, tenant_id: Option<String>) -> Self {
        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();
        match EnvironmentCredential::from_env(authority) {
            Some(env) => sources.push(Box::new(env)),
            None => debug!("Environment credential not configured, skipping"),
        }
        sources.push(Box::new(ManagedIdentityCredential::new()));
        sources.push(Box::new(AzureCliCredential::new(tenant_id)));
        Self::new(sources)
    }

    fn cached(&self, scope: &str) -> Option<AccessToken> {
        let cache = self.cache.lock().ok()?;
        cache.get(scope).filter(|t| t.is_fresh()).cloned()
    }

    fn remember(&self, idx: usize, scope: &str, token: &AccessToken) {
        if let Ok(mut selected) = self.selected.lock() {
            *selected = Some(idx);
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(scope.to_string(), token.clone());
        }
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    fn name(&self) -> &'static str {
        "default chain"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        if let Some(token) = self.cached(scope) {
            return Ok(token);
        }

        let selected = self.selected.lock().ok().and_then(|s| *s);
        if let Some(idx) = selected {
            let source = &self.sources[idx];
            let token = source.get_token(scope).await.map_err(|e| CredentialError {
                attempts: vec![format!("{}: {e}", source.name())],
            })?;
            self.remember(idx, scope, &token);
            return Ok(token);
        }

        let mut attempts = Vec::new();
        for (idx, source) in self.sources.iter().enumerate() {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!("Authenticated with {} credential", source.name());
                    self.remember(idx, scope, &token);
                    return Ok(token);
                }
                Err(e) => {
                    debug!("{} credential unavailable: {e}", source.name());
                    attempts.push(format!("{}: {}", source.name(), e.attempts.join(", ")));
                }
            }
        }

        if attempts.is_empty() {
            attempts.push("no credential sources configured".to_string());
        }
        Err(CredentialError { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeSource {
        name: &'static str,
        ok: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenCredential for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(AccessToken::expires_in(format!("{}-token", self.name), Some(3600)))
            } else {
                Err(CredentialError::single("nope"))
            }
        }
    }

    fn fake(name: &'static str, ok: bool) -> (Box<dyn TokenCredential>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(FakeSource {
                name,
                ok,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[tokio::test]
    async fn chain_falls_through_to_first_working_source() {
        let (first, first_calls) = fake("first", false);
        let (second, second_calls) = fake("second", true);
        let (third, third_calls) = fake("third", true);
        let chain = ChainedCredential::new(vec![first, second, third]);

        let token = chain.get_token("scope-a").await.unwrap();

        assert_eq!(token.token, "second-token");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn chain_sticks_with_selected_source_and_caches() {
        let (first, first_calls) = fake("first", false);
        let (second, second_calls) = fake("second", true);
        let chain = ChainedCredential::new(vec![first, second]);

        chain.get_token("scope-a").await.unwrap();
        chain.get_token("scope-a").await.unwrap();
        chain.get_token("scope-b").await.unwrap();

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        // scope-a once, cached on the second call, scope-b once
        assert_eq!(second_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn chain_reports_every_failure() {
        let (first, _) = fake("first", false);
        let (second, _) = fake("second", false);
        let chain = ChainedCredential::new(vec![first, second]);

        let err = chain.get_token("scope").await.unwrap_err();

        assert_eq!(err.attempts.len(), 2);
        assert!(err.attempts[0].starts_with("first"));
        assert!(err.attempts[1].starts_with("second"));
    }

    #[tokio::test]
    async fn environment_credential_uses_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "sp-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = EnvironmentCredential::new(server.uri(), "tenant-1", "client", "secret");
        let token = credential
            .get_token("https://management.azure.com/.default")
            .await
            .unwrap();

        assert_eq!(token.token, "sp-token");
        assert!(token.is_fresh());
    }

    #[tokio::test]
    async fn managed_identity_accepts_string_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mi-token",
                "expires_in": "3599"
            })))
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::with_endpoint(format!("{}/token", server.uri()));
        let token = credential.get_token("https://graph.microsoft.com/.default").await.unwrap();

        assert_eq!(token.token, "mi-token");
        assert!(token.expires_at.is_some());
    }

    #[test]
    fn scope_maps_to_resource() {
        assert_eq!(
            scope_to_resource("https://management.azure.com/.default"),
            "https://management.azure.com"
        );
        assert_eq!(scope_to_resource("custom"), "custom");
    }
}
