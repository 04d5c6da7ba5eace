//! Registry collaborators used by the cleaning engine.
//!
//! The engine only talks to the traits declared here; the HTTP
//! implementations live in the submodules and are wired by `clean::Command::new`.

mod catalog;
mod content;
mod credentials;
mod error;
pub mod http_client;
mod lifecycle;
mod pagination;
mod token_cache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use std::sync::Arc;

use crate::oci::Digest;

pub use catalog::HttpRegistryCatalog;
pub use content::HttpRepositoryContent;
pub use credentials::{ConfiguredCredentialProvider, CredentialProvider, Credentials, RegistryContext};
pub use error::Error;
pub use lifecycle::{EolAnnotation, LifecycleMetadata, ReferrersLifecycleMetadata};

#[cfg(test)]
pub use credentials::MockCredentialProvider;
#[cfg(test)]
pub use lifecycle::MockLifecycleMetadata;

#[derive(Clone, Debug, PartialEq)]
pub struct RepositoryProperties {
    pub name: String,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ManifestEntry {
    pub repository: String,
    pub digest: Digest,
    pub tags: Vec<String>,
    pub last_updated_at: DateTime<Utc>,
}

impl ManifestEntry {
    pub fn is_dangling(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Registry-wide operations: repository enumeration and deletion.
#[async_trait]
pub trait RegistryCatalog: Send + Sync {
    /// Lazily enumerates repository names, fetching pages on demand.
    fn list_repositories<'a>(
        &'a self,
        context: &'a RegistryContext,
    ) -> BoxStream<'a, Result<String, Error>>;

    async fn get_repository(
        &self,
        context: &RegistryContext,
        name: &str,
    ) -> Result<RepositoryProperties, Error>;

    /// Lazily enumerates every manifest of a repository, tagged or not.
    fn list_manifests<'a>(
        &'a self,
        context: &'a RegistryContext,
        repository: &'a str,
    ) -> BoxStream<'a, Result<ManifestEntry, Error>>;

    async fn delete_repository(&self, context: &RegistryContext, name: &str)
        -> Result<(), Error>;

    fn repository_content(&self, repository: &str) -> Arc<dyn RepositoryContent>;
}

/// Manifest operations scoped to a single repository.
#[async_trait]
pub trait RepositoryContent: Send + Sync {
    async fn get_manifest(
        &self,
        context: &RegistryContext,
        digest: &Digest,
    ) -> Result<Vec<u8>, Error>;

    async fn delete_manifest(&self, context: &RegistryContext, digest: &Digest)
        -> Result<(), Error>;
}
