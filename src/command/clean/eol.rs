use std::sync::Arc;
use tracing::debug;

use crate::command::clean::Error;
use crate::oci::{Digest, ImageReference, Manifest};
use crate::registry::{
    self, EolAnnotation, LifecycleMetadata, RegistryContext, RepositoryContent,
};

/// Answers end-of-life questions about manifests: whether a manifest is itself
/// an annotation artifact, and which EOL date was declared for an image.
pub struct EolResolver {
    lifecycle: Arc<dyn LifecycleMetadata>,
}

impl EolResolver {
    pub fn new(lifecycle: Arc<dyn LifecycleMetadata>) -> Self {
        Self { lifecycle }
    }

    pub async fn is_annotation(
        &self,
        context: &RegistryContext,
        content: &dyn RepositoryContent,
        digest: &Digest,
    ) -> Result<bool, Error> {
        let body = content.get_manifest(context, digest).await?;
        let manifest = Manifest::from_slice(&body).map_err(registry::Error::from)?;

        Ok(manifest.is_annotation())
    }

    pub async fn end_of_life(
        &self,
        context: &RegistryContext,
        reference: &ImageReference,
    ) -> Result<Option<EolAnnotation>, Error> {
        let annotation = self.lifecycle.end_of_life(context, reference).await?;
        if let Some(annotation) = &annotation {
            debug!(
                "'{reference}' reaches end of life on {}",
                annotation.end_of_life
            );
        }
        Ok(annotation)
    }
}
