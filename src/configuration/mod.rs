use hyper::Uri;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

mod error;

use crate::registry::http_client::HttpClientConfig;
use crate::registry::Credentials;
pub use error::Error;

/// Environment variable overriding `registry.password`.
pub const PASSWORD_ENV: &str = "REGISTRY_PASSWORD";

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    pub registry: RegistryConfig,
    #[serde(default)]
    pub clean: CleanConfig,
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegistryConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub server_ca_bundle: Option<String>,
    pub client_certificate: Option<String>,
    pub client_private_key: Option<String>,
    #[serde(default = "RegistryConfig::default_max_redirect")]
    pub max_redirect: u8,
}

impl RegistryConfig {
    fn default_max_redirect() -> u8 {
        5
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            server_ca_bundle: self.server_ca_bundle.clone(),
            client_certificate: self.client_certificate.clone(),
            client_private_key: self.client_private_key.clone(),
            max_redirect: self.max_redirect,
        }
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials_with(env::var(PASSWORD_ENV).ok())
    }

    fn credentials_with(&self, password_override: Option<String>) -> Option<Credentials> {
        let password = password_override.or_else(|| self.password.clone());

        match (&self.username, password) {
            (Some(username), Some(password)) => Some(Credentials::new(username, &password)),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Username and password must be both provided");
                None
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CleanConfig {
    #[serde(default = "CleanConfig::default_max_concurrent_deletes")]
    pub max_concurrent_deletes: usize,
    #[serde(default = "CleanConfig::default_page_size")]
    pub page_size: u16,
}

impl Default for CleanConfig {
    fn default() -> Self {
        CleanConfig {
            max_concurrent_deletes: CleanConfig::default_max_concurrent_deletes(),
            page_size: CleanConfig::default_page_size(),
        }
    }
}

impl CleanConfig {
    fn default_max_concurrent_deletes() -> usize {
        5
    }

    fn default_page_size() -> u16 {
        100
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice).map_err(|e| {
            println!("Configuration file format error:");
            println!("{e}");
            Error::ConfigurationFileFormat(e.to_string())
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let url = &self.registry.url;
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::InvalidRegistryUrl(format!("'{url}': {e}")))?;

        if !matches!(uri.scheme_str(), Some("http" | "https")) || uri.authority().is_none() {
            return Err(Error::InvalidRegistryUrl(format!(
                "'{url}' must be an absolute http(s) URL"
            )));
        }

        if self.clean.max_concurrent_deletes == 0 {
            return Err(Error::ConfigurationFileFormat(
                "clean.max_concurrent_deletes must be at least 1".to_string(),
            ));
        }

        if self.clean.page_size == 0 {
            return Err(Error::ConfigurationFileFormat(
                "clean.page_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
