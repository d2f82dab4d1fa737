//! Entra ID token acquisition.
//!
//! Each credential source is independently constructible and individually
//! fallible. [`ChainedTokenCredential`] tries them in order, and
//! [`BearerTokenProvider`] caches the winning token for the HTTP client. The
//! rest of the workspace only ever sees the provider.
//!
//! | Source | Where it works |
//! |--------|----------------|
//! | [`ManagedIdentityCredential`] | Azure App Service, Functions, VMs, AKS |
//! | [`ClientSecretCredential`] | Anywhere a service principal secret is configured |
//! | [`AzureCliCredential`] | Developer machines after `az login` |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{AzureOpenAiConfig, ServicePrincipal};

/// Scope covering Azure OpenAI and the other Cognitive Services.
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_TIMEOUT: Duration = Duration::from_secs(2);

// Refresh this long before the reported expiry.
const REFRESH_MARGIN_SECS: i64 = 300;

/// A bearer token and the instant it stops being accepted.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token value.
    pub token: SecretString,
    /// Expiry reported by the issuer.
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - chrono::Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Failure to obtain an access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The source does not apply in this environment (no identity endpoint,
    /// no CLI login). The chain moves on.
    #[error("{credential} unavailable: {message}")]
    Unavailable {
        /// Name of the source, as returned by [`TokenCredential::name`].
        credential: &'static str,
        /// Why the source does not apply.
        message: String,
    },
    /// The source applies but the issuer refused or answered unexpectedly.
    #[error("{credential} failed: {message}")]
    Failed {
        /// Name of the source, as returned by [`TokenCredential::name`].
        credential: &'static str,
        /// The issuer's answer or the decoding failure.
        message: String,
    },
    /// Every source in a chain failed.
    #[error("no credential could provide a token: {}", summarise(.0))]
    Exhausted(Vec<CredentialError>),
}

fn summarise(attempts: &[CredentialError]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A source of Entra ID access tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Requests a token for `scope` (a `.default` scope URI).
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

/// Token endpoint answer shared by IMDS, App Service, and the OAuth2 endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<NumberOrString>,
    #[serde(default)]
    expires_on: Option<NumberOrString>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl TokenResponse {
    fn into_access_token(
        self,
        credential: &'static str,
        now: DateTime<Utc>,
    ) -> Result<AccessToken, CredentialError> {
        if self.access_token.is_empty() {
            return Err(CredentialError::Failed {
                credential,
                message: "token endpoint returned an empty access token".to_string(),
            });
        }

        let expires_on = self
            .expires_on
            .as_ref()
            .and_then(NumberOrString::as_i64)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                self.expires_in
                    .as_ref()
                    .and_then(NumberOrString::as_i64)
                    .map(|secs| now + chrono::Duration::seconds(secs))
            })
            .ok_or_else(|| CredentialError::Failed {
                credential,
                message: "token response carried no expiry".to_string(),
            })?;

        Ok(AccessToken {
            token: SecretString::from(self.access_token),
            expires_on,
        })
    }
}

/// Turns `https://host/.default` into the `https://host` resource form used by
/// the managed identity and CLI endpoints.
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

// ---------------------------------------------------------------------------
// Managed identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum IdentityEndpoint {
    /// App Service / Functions local identity endpoint.
    AppService { endpoint: String, header: String },
    /// Azure Instance Metadata Service.
    Imds,
}

/// Managed identity of the hosting Azure resource.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: IdentityEndpoint,
}

impl ManagedIdentityCredential {
    /// Picks the App Service endpoint when `IDENTITY_ENDPOINT` and
    /// `IDENTITY_HEADER` are set, IMDS otherwise.
    pub fn new(http: reqwest::Client) -> Self {
        let endpoint = match (
            std::env::var("IDENTITY_ENDPOINT").ok(),
            std::env::var("IDENTITY_HEADER").ok(),
        ) {
            (Some(endpoint), Some(header)) => IdentityEndpoint::AppService { endpoint, header },
            _ => IdentityEndpoint::Imds,
        };
        Self { http, endpoint }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let resource = scope_to_resource(scope);
        let request = match &self.endpoint {
            IdentityEndpoint::AppService { endpoint, header } => self
                .http
                .get(endpoint)
                .header("X-IDENTITY-HEADER", header)
                .query(&[("api-version", "2019-08-01"), ("resource", resource)]),
            IdentityEndpoint::Imds => self
                .http
                .get(IMDS_ENDPOINT)
                .header("Metadata", "true")
                .timeout(IMDS_TIMEOUT)
                .query(&[("api-version", "2018-02-01"), ("resource", resource)]),
        };

        let response = request
            .send()
            .await
            .map_err(|err| CredentialError::Unavailable {
                credential: self.name(),
                message: format!("identity endpoint unreachable: {err}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // IMDS answers 400 when no identity is assigned to the resource.
            return Err(if status.as_u16() == 400 {
                CredentialError::Unavailable {
                    credential: self.name(),
                    message: format!("no identity assigned: {body}"),
                }
            } else {
                CredentialError::Failed {
                    credential: self.name(),
                    message: format!("identity endpoint returned {status}: {body}"),
                }
            });
        }

        let body: TokenResponse = response.json().await.map_err(|err| CredentialError::Failed {
            credential: self.name(),
            message: format!("could not decode token response: {err}"),
        })?;
        body.into_access_token(self.name(), Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Service principal
// ---------------------------------------------------------------------------

/// OAuth2 client-credentials grant for a configured service principal.
#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    http: reqwest::Client,
    principal: ServicePrincipal,
    authority: String,
}

impl ClientSecretCredential {
    /// Creates a credential against the public-cloud authority.
    pub fn new(http: reqwest::Client, principal: ServicePrincipal) -> Self {
        Self::with_authority(http, principal, AUTHORITY_HOST)
    }

    /// Creates a credential against another authority host (sovereign clouds, tests).
    pub fn with_authority(
        http: reqwest::Client,
        principal: ServicePrincipal,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            http,
            principal,
            authority: authority.into().trim_end_matches('/').to_string(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority, self.principal.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "ClientSecretCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        use secrecy::ExposeSecret;

        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.principal.client_id.as_str()),
                ("client_secret", self.principal.client_secret.expose_secret()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|err| CredentialError::Failed {
                credential: self.name(),
                message: format!("token request failed: {err}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Failed {
                credential: self.name(),
                message: format!("token endpoint returned {status}: {body}"),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|err| CredentialError::Failed {
            credential: self.name(),
            message: format!("could not decode token response: {err}"),
        })?;
        body.into_access_token(self.name(), Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Azure CLI
// ---------------------------------------------------------------------------

/// Token of the account signed in with `az login`.
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential;

impl AzureCliCredential {
    /// Uses the CLI's signed-in account and default tenant.
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenOutput {
    access_token: String,
    // Local wall-clock time, e.g. "2024-05-01 13:45:10.000000".
    #[serde(default)]
    expires_on: Option<String>,
    // POSIX seconds; present in azure-cli 2.54 and later.
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

fn parse_cli_output(stdout: &str) -> Result<AccessToken, String> {
    let output: CliTokenOutput =
        serde_json::from_str(stdout).map_err(|err| format!("unexpected az output: {err}"))?;

    let expires_on = match output.expires_on_epoch {
        Some(secs) => Utc.timestamp_opt(secs, 0).single(),
        None => output
            .expires_on
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc)),
    }
    .ok_or_else(|| "az output carried no usable expiry".to_string())?;

    Ok(AccessToken {
        token: SecretString::from(output.access_token),
        expires_on,
    })
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut command = Command::new("az");
        command.args([
            "account",
            "get-access-token",
            "--output",
            "json",
            "--resource",
            scope_to_resource(scope),
        ]);

        let output = command
            .output()
            .await
            .map_err(|err| CredentialError::Unavailable {
                credential: self.name(),
                message: format!("could not run az: {err}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::Unavailable {
                credential: self.name(),
                message: format!("az exited with {}: {}", output.status, stderr.trim()),
            });
        }

        parse_cli_output(&String::from_utf8_lossy(&output.stdout)).map_err(|message| {
            CredentialError::Failed {
                credential: self.name(),
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Chain and provider
// ---------------------------------------------------------------------------

/// Tries each source in order and returns the first token obtained.
pub struct ChainedTokenCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    /// Creates a chain over `sources`, tried in the given order.
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// Managed identity, then the configured service principal (if any),
    /// then the Azure CLI.
    pub fn from_config(config: &AzureOpenAiConfig, http: reqwest::Client) -> Self {
        let mut sources: Vec<Arc<dyn TokenCredential>> =
            vec![Arc::new(ManagedIdentityCredential::new(http.clone()))];
        if let Some(principal) = &config.service_principal {
            sources.push(Arc::new(ClientSecretCredential::new(
                http,
                principal.clone(),
            )));
        }
        sources.push(Arc::new(AzureCliCredential::new()));
        Self::new(sources)
    }
}

impl std::fmt::Debug for ChainedTokenCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    fn name(&self) -> &'static str {
        "ChainedTokenCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let mut attempts = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(credential = source.name(), "acquired access token");
                    return Ok(token);
                }
                Err(err) => {
                    debug!(credential = source.name(), error = %err, "credential skipped");
                    attempts.push(err);
                }
            }
        }
        Err(CredentialError::Exhausted(attempts))
    }
}

/// Hands out bearer tokens for one scope, reusing a token until shortly
/// before it expires.
pub struct BearerTokenProvider {
    credential: Arc<dyn TokenCredential>,
    scope: String,
    cached: Mutex<Option<AccessToken>>,
}

impl BearerTokenProvider {
    /// Creates a provider for `scope` backed by `credential`.
    pub fn new(credential: Arc<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self {
            credential,
            scope: scope.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a token valid for at least the refresh margin.
    pub async fn bearer_token(&self) -> Result<SecretString, CredentialError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh_at(Utc::now())) {
            return Ok(token.token.clone());
        }

        let token = self.credential.get_token(&self.scope).await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }
}

impl std::fmt::Debug for BearerTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenProvider")
            .field("credential", &self.credential.name())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
