//! Azure OpenAI infrastructure adapter.
//!
//! Implements the [`drafting::ChatCompletion`] trait for Azure OpenAI
//! deployments, authenticated with Microsoft Entra ID tokens rather than API
//! keys.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response decoding,
//! credential resolution, and token caching live here. The [`drafting`]
//! crate sees only [`drafting::ChatCompletion`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | [`AzureOpenAiConfig`] read from environment variables |
//! | [`credentials`] | Credential sources, the ordered chain, and [`BearerTokenProvider`] |
//! | [`client`] | [`AzureOpenAiClient`] |

pub mod client;
pub mod config;
pub mod credentials;

pub use client::AzureOpenAiClient;
pub use config::{AzureOpenAiConfig, ConfigError, Environment, ServicePrincipal};
pub use credentials::{
    AccessToken, AzureCliCredential, BearerTokenProvider, ChainedTokenCredential,
    ClientSecretCredential, CredentialError, ManagedIdentityCredential, TokenCredential,
    COGNITIVE_SERVICES_SCOPE,
};
