//! Settings for the Azure OpenAI client, read from environment variables.
//!
//! The configuration is validated once, up front. A missing endpoint or
//! deployment fails here, before any credential is requested or any request
//! is sent.

use std::str::FromStr;
use std::time::Duration;

use drafting::{AssistantError, DeploymentName};
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variable names understood by [`AzureOpenAiConfig::from_env`].
pub mod vars {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub const ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
    /// Deployment name of the chat model.
    pub const DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
    /// Optional data-plane API version; selects the versioned deployments route.
    pub const API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
    /// Optional request timeout in seconds.
    pub const TIMEOUT_SECS: &str = "AZURE_OPENAI_TIMEOUT_SECS";
    /// Service principal tenant.
    pub const TENANT_ID: &str = "AZURE_TENANT_ID";
    /// Service principal application (client) id.
    pub const CLIENT_ID: &str = "AZURE_CLIENT_ID";
    /// Service principal secret.
    pub const CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
    /// Deployment environment: `local`, `dev`, or `prod`.
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
}

/// Where the process is running. Drives defaults such as log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// A developer machine.
    #[default]
    Local,
    /// A shared development deployment.
    Dev,
    /// Production.
    Prod,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            _ => Err(ConfigError::Invalid {
                var: vars::ENVIRONMENT,
                value: value.to_string(),
                expected: "local|dev|prod",
            }),
        }
    }
}

/// Credentials of an Entra ID application registration.
#[derive(Debug, Clone)]
pub struct ServicePrincipal {
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

/// Validated Azure OpenAI settings.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint without a trailing slash.
    pub endpoint: String,
    /// Chat model deployment.
    pub deployment: DeploymentName,
    /// Data-plane API version, when the versioned route is wanted.
    pub api_version: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Service principal, when all three of its variables are set.
    pub service_principal: Option<ServicePrincipal>,
    /// Deployment environment.
    pub environment: Environment,
}

/// Settings that are absent or malformed.
///
/// Raised while loading, before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("missing required setting `{var}`")]
    Missing {
        /// Name of the environment variable.
        var: &'static str,
    },

    /// A variable is set but cannot be interpreted.
    #[error("invalid value `{value}` for `{var}` (expected {expected})")]
    Invalid {
        /// Name of the environment variable.
        var: &'static str,
        /// The value as read.
        value: String,
        /// Description of the accepted values.
        expected: &'static str,
    },

    /// Some, but not all, of the tenant ID, client ID, and client secret are set.
    #[error("service principal is partially configured; `{missing}` is not set")]
    PartialServicePrincipal {
        /// The first service-principal variable found unset.
        missing: &'static str,
    },
}

impl From<ConfigError> for AssistantError {
    fn from(err: ConfigError) -> Self {
        AssistantError::Configuration {
            message: err.to_string(),
        }
    }
}

impl AzureOpenAiConfig {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = read(vars::ENDPOINT).ok_or(ConfigError::Missing {
            var: vars::ENDPOINT,
        })?;
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                var: vars::ENDPOINT,
                value: endpoint,
                expected: "an http(s) URL",
            });
        }
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let deployment = read(vars::DEPLOYMENT)
            .and_then(DeploymentName::new)
            .ok_or(ConfigError::Missing {
                var: vars::DEPLOYMENT,
            })?;

        let timeout = match read(vars::TIMEOUT_SECS) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if (1..=600).contains(&secs) => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: vars::TIMEOUT_SECS,
                        value,
                        expected: "an integer in 1..=600",
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let environment = match read(vars::ENVIRONMENT) {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        Ok(Self {
            endpoint,
            deployment,
            api_version: read(vars::API_VERSION),
            timeout,
            service_principal: read_service_principal(&read)?,
            environment,
        })
    }

    /// The chat-completions URL for this deployment.
    ///
    /// Without an API version the v1 route is used and the deployment travels
    /// as the `model` field; with one, the deployment is a path segment.
    pub fn chat_completions_url(&self) -> String {
        match &self.api_version {
            Some(version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint, self.deployment, version
            ),
            None => format!("{}/openai/v1/chat/completions", self.endpoint),
        }
    }
}

fn read_service_principal<F>(read: &F) -> Result<Option<ServicePrincipal>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let tenant_id = read(vars::TENANT_ID);
    let client_id = read(vars::CLIENT_ID);
    let client_secret = read(vars::CLIENT_SECRET);

    match (tenant_id, client_id, client_secret) {
        (None, None, None) => Ok(None),
        (Some(tenant_id), Some(client_id), Some(secret)) => Ok(Some(ServicePrincipal {
            tenant_id,
            client_id,
            client_secret: SecretString::from(secret),
        })),
        (tenant, client, _) => Err(ConfigError::PartialServicePrincipal {
            missing: if tenant.is_none() {
                vars::TENANT_ID
            } else if client.is_none() {
                vars::CLIENT_ID
            } else {
                vars::CLIENT_SECRET
            },
        }),
    }
}
