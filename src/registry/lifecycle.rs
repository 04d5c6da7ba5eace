//! End-of-life metadata attached to images through lifecycle annotation
//! artifacts, discovered with the OCI referrers API.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hyper::Method;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::oci::{Descriptor, Digest, ImageReference, ReferrerList};
use crate::registry::http_client::{ensure_success, read_body, HttpClient};
use crate::registry::pagination::next_page_location;
use crate::registry::{Error, RegistryContext};

pub const LIFECYCLE_ARTIFACT_TYPE: &str = "application/vnd.microsoft.artifact.lifecycle";
pub const END_OF_LIFE_ANNOTATION: &str = "vnd.microsoft.artifact.lifecycle.end-of-life.date";

const IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Declared end-of-life of an image.
#[derive(Clone, Debug, PartialEq)]
pub struct EolAnnotation {
    /// Digest of the annotation manifest carrying the date.
    pub digest: Digest,
    pub end_of_life: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleMetadata: Send + Sync {
    /// Returns the EOL annotation of `reference`, if it has one.
    async fn end_of_life(
        &self,
        context: &RegistryContext,
        reference: &ImageReference,
    ) -> Result<Option<EolAnnotation>, Error>;
}

pub struct ReferrersLifecycleMetadata {
    client: Arc<HttpClient>,
}

impl ReferrersLifecycleMetadata {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReferrersQuery<'a> {
    artifact_type: &'a str,
}

#[async_trait]
impl LifecycleMetadata for ReferrersLifecycleMetadata {
    #[instrument(skip(self, context), fields(reference = %reference))]
    async fn end_of_life(
        &self,
        context: &RegistryContext,
        reference: &ImageReference,
    ) -> Result<Option<EolAnnotation>, Error> {
        let query = serde_urlencoded::to_string(ReferrersQuery {
            artifact_type: LIFECYCLE_ARTIFACT_TYPE,
        })?;
        let scope = format!("repository:{}:*", reference.repository);

        let mut referrers = Vec::new();
        let mut next_page = Some(format!(
            "{}/v2/{}/referrers/{}?{query}",
            context.url, reference.repository, reference.digest
        ));

        while let Some(location) = next_page {
            let response = self
                .client
                .request(context, &scope, &Method::GET, &[IMAGE_INDEX], &location)
                .await?;
            ensure_success(&response, &location)?;

            next_page = next_page_location(&response, &context.url);
            let list = ReferrerList::from_slice(&read_body(response).await?)?;
            referrers.extend(list.manifests);
        }

        let annotation = select_end_of_life(&referrers)?;
        debug!("End-of-life annotation: {annotation:?}");
        Ok(annotation)
    }
}

/// Picks the latest declared end-of-life among lifecycle referrers.
///
/// Registries may ignore the `artifactType` filter, so descriptors are
/// filtered again here.
fn select_end_of_life(referrers: &[Descriptor]) -> Result<Option<EolAnnotation>, Error> {
    let mut selected: Option<EolAnnotation> = None;

    for descriptor in referrers {
        if descriptor.artifact_type.as_deref() != Some(LIFECYCLE_ARTIFACT_TYPE) {
            continue;
        }
        let Some(value) = descriptor.annotation(END_OF_LIFE_ANNOTATION) else {
            continue;
        };

        let annotation = EolAnnotation {
            digest: descriptor.digest.parse()?,
            end_of_life: parse_end_of_life(value)?,
        };

        match &selected {
            Some(current) if current.end_of_life >= annotation.end_of_life => {}
            _ => selected = Some(annotation),
        }
    }

    Ok(selected)
}

/// Accepts RFC 3339 timestamps and plain dates; a plain date means midnight UTC.
pub fn parse_end_of_life(value: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|timestamp| timestamp.and_utc())
        .ok_or_else(|| Error::InvalidResponse(format!("Invalid end-of-life date: '{value}'")))
}
