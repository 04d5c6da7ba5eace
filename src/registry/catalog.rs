//! Catalog client for registries exposing the `/acr/v1` management data
//! plane, which (unlike the distribution `/v2/` API) reports untagged
//! manifests, their timestamps, and supports deleting whole repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, Stream};
use futures_util::{StreamExt, TryStreamExt};
use hyper::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::oci::Digest;
use crate::registry::http_client::{ensure_success, read_body, HttpClient};
use crate::registry::pagination::next_page_location;
use crate::registry::{
    Error, HttpRepositoryContent, ManifestEntry, RegistryCatalog, RegistryContext,
    RepositoryContent, RepositoryProperties,
};

const JSON: &str = "application/json";
const CATALOG_SCOPE: &str = "registry:catalog:*";

#[derive(Debug, Default, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryAttributes {
    image_name: String,
    last_update_time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestPage {
    #[serde(default)]
    manifests: Vec<ManifestAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestAttributes {
    digest: Digest,
    #[serde(default)]
    tags: Option<Vec<String>>,
    last_update_time: DateTime<Utc>,
}

impl ManifestAttributes {
    fn into_entry(self, repository: &str) -> ManifestEntry {
        ManifestEntry {
            repository: repository.to_string(),
            digest: self.digest,
            tags: self.tags.unwrap_or_default(),
            last_updated_at: self.last_update_time,
        }
    }
}

pub struct HttpRegistryCatalog {
    client: Arc<HttpClient>,
    page_size: u16,
}

impl HttpRegistryCatalog {
    pub fn new(client: Arc<HttpClient>, page_size: u16) -> Self {
        Self { client, page_size }
    }

    fn pages<'a, T>(
        &'a self,
        context: &'a RegistryContext,
        scope: String,
        first_page: String,
    ) -> impl Stream<Item = Result<T, Error>> + Send + 'a
    where
        T: DeserializeOwned + Send + 'a,
    {
        stream::try_unfold(
            (Some(first_page), scope),
            move |(location, scope)| async move {
                let Some(location) = location else {
                    return Ok(None);
                };

                let response = self
                    .client
                    .request(context, &scope, &Method::GET, &[JSON], &location)
                    .await?;
                ensure_success(&response, &location)?;

                let next_page = next_page_location(&response, &context.url);
                let page: T = serde_json::from_slice(&read_body(response).await?)?;

                Ok(Some((page, (next_page, scope))))
            },
        )
    }
}

fn repository_scope(name: &str) -> String {
    format!("repository:{name}:*")
}

#[async_trait]
impl RegistryCatalog for HttpRegistryCatalog {
    fn list_repositories<'a>(
        &'a self,
        context: &'a RegistryContext,
    ) -> BoxStream<'a, Result<String, Error>> {
        let first_page = format!("{}/acr/v1/_catalog?n={}", context.url, self.page_size);

        self.pages::<CatalogPage>(context, CATALOG_SCOPE.to_string(), first_page)
            .map_ok(|page| stream::iter(page.repositories.into_iter().map(Ok::<_, Error>)))
            .try_flatten()
            .boxed()
    }

    #[instrument(skip(self, context))]
    async fn get_repository(
        &self,
        context: &RegistryContext,
        name: &str,
    ) -> Result<RepositoryProperties, Error> {
        let location = format!("{}/acr/v1/{name}", context.url);
        let response = self
            .client
            .request(context, &repository_scope(name), &Method::GET, &[JSON], &location)
            .await?;
        ensure_success(&response, &location)?;

        let attributes: RepositoryAttributes = serde_json::from_slice(&read_body(response).await?)?;

        Ok(RepositoryProperties {
            name: attributes.image_name,
            last_updated_at: attributes.last_update_time,
        })
    }

    fn list_manifests<'a>(
        &'a self,
        context: &'a RegistryContext,
        repository: &'a str,
    ) -> BoxStream<'a, Result<ManifestEntry, Error>> {
        let first_page = format!(
            "{}/acr/v1/{repository}/_manifests?n={}",
            context.url, self.page_size
        );

        self.pages::<ManifestPage>(context, repository_scope(repository), first_page)
            .map_ok(move |page| {
                stream::iter(
                    page.manifests
                        .into_iter()
                        .map(move |attributes| Ok::<_, Error>(attributes.into_entry(repository))),
                )
            })
            .try_flatten()
            .boxed()
    }

    #[instrument(skip(self, context))]
    async fn delete_repository(&self, context: &RegistryContext, name: &str) -> Result<(), Error> {
        let location = format!("{}/acr/v1/{name}", context.url);
        let response = self
            .client
            .request(context, &repository_scope(name), &Method::DELETE, &[JSON], &location)
            .await?;
        ensure_success(&response, &location)?;

        info!("Repository '{name}' deleted");
        Ok(())
    }

    fn repository_content(&self, repository: &str) -> Arc<dyn RepositoryContent> {
        Arc::new(HttpRepositoryContent::new(self.client.clone(), repository))
    }
}
