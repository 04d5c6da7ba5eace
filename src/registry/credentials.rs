use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use hyper::{Method, StatusCode, Uri};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::registry::http_client::HttpClient;
use crate::registry::Error;

#[derive(Clone, PartialEq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn basic_authorization(&self) -> String {
        let encoded = BASE64_STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {encoded}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated scope of a run against one registry.
///
/// Obtained once from a [`CredentialProvider`] and passed by reference to
/// every collaborator call; it is never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryContext {
    /// Registry identity used in fully-qualified references (host[:port]).
    pub registry: String,
    /// Base URL of the registry API, without trailing slash.
    pub url: String,
    pub credentials: Option<Credentials>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authenticate(&self, registry_url: &str) -> Result<RegistryContext, Error>;
}

/// Credentials taken from the configuration file, checked against the
/// registry's `/v2/` endpoint before the run starts.
pub struct ConfiguredCredentialProvider {
    client: Arc<HttpClient>,
    credentials: Option<Credentials>,
}

impl ConfiguredCredentialProvider {
    pub fn new(client: Arc<HttpClient>, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

#[async_trait]
impl CredentialProvider for ConfiguredCredentialProvider {
    #[instrument(skip(self))]
    async fn authenticate(&self, registry_url: &str) -> Result<RegistryContext, Error> {
        let context = build_context(registry_url, self.credentials.clone())?;

        let location = format!("{}/v2/", context.url);
        let response = self
            .client
            .request(&context, "base", &Method::GET, &[], &location)
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                status: response.status(),
                location,
            });
        }

        info!("Authenticated against registry '{}'", context.registry);
        Ok(context)
    }
}

pub fn build_context(
    registry_url: &str,
    credentials: Option<Credentials>,
) -> Result<RegistryContext, Error> {
    let uri: Uri = registry_url.parse()?;
    let registry = uri
        .authority()
        .map(ToString::to_string)
        .ok_or_else(|| Error::Internal(format!("Registry URL '{registry_url}' has no host")))?;

    Ok(RegistryContext {
        registry,
        url: registry_url.trim_end_matches('/').to_string(),
        credentials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context() {
        let context = build_context("https://example.azurecr.io/", None).unwrap();

        assert_eq!(context.registry, "example.azurecr.io");
        assert_eq!(context.url, "https://example.azurecr.io");
        assert!(context.credentials.is_none());
    }

    #[test]
    fn test_build_context_with_port() {
        let credentials = Credentials::new("user", "secret");
        let context = build_context("http://localhost:5000", Some(credentials.clone())).unwrap();

        assert_eq!(context.registry, "localhost:5000");
        assert_eq!(context.credentials, Some(credentials));
    }

    #[test]
    fn test_build_context_without_host() {
        assert!(build_context("/relative/path", None).is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials::new("user", "secret");
        let debug = format!("{credentials:?}");

        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }
}
