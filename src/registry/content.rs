use async_trait::async_trait;
use hyper::Method;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::oci::Digest;
use crate::registry::http_client::{ensure_success, read_body, HttpClient};
use crate::registry::{Error, RegistryContext, RepositoryContent};

const MANIFEST_MEDIA_TYPES: [&str; 4] = [
    "application/vnd.oci.image.manifest.v1+json",
    "application/vnd.oci.image.index.v1+json",
    "application/vnd.docker.distribution.manifest.v2+json",
    "application/vnd.docker.distribution.manifest.list.v2+json",
];

/// Distribution API (`/v2/`) manifest operations for one repository.
pub struct HttpRepositoryContent {
    client: Arc<HttpClient>,
    repository: String,
    scope: String,
}

impl HttpRepositoryContent {
    pub fn new(client: Arc<HttpClient>, repository: &str) -> Self {
        Self {
            client,
            repository: repository.to_string(),
            scope: format!("repository:{repository}:*"),
        }
    }

    fn manifest_location(&self, context: &RegistryContext, digest: &Digest) -> String {
        format!("{}/v2/{}/manifests/{digest}", context.url, self.repository)
    }
}

#[async_trait]
impl RepositoryContent for HttpRepositoryContent {
    #[instrument(skip(self, context), fields(repository = %self.repository))]
    async fn get_manifest(
        &self,
        context: &RegistryContext,
        digest: &Digest,
    ) -> Result<Vec<u8>, Error> {
        let location = self.manifest_location(context, digest);
        let response = self
            .client
            .request(
                context,
                &self.scope,
                &Method::GET,
                &MANIFEST_MEDIA_TYPES,
                &location,
            )
            .await?;
        ensure_success(&response, &location)?;

        read_body(response).await
    }

    #[instrument(skip(self, context), fields(repository = %self.repository))]
    async fn delete_manifest(&self, context: &RegistryContext, digest: &Digest) -> Result<(), Error> {
        let location = self.manifest_location(context, digest);
        let response = self
            .client
            .request(context, &self.scope, &Method::DELETE, &[], &location)
            .await?;
        ensure_success(&response, &location)?;

        debug!("Manifest '{}@{digest}' deleted", self.repository);
        Ok(())
    }
}
