use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use futures_util::TryStreamExt;
use std::fmt;
use tracing::{debug, info, instrument};

use crate::command::clean::eol::EolResolver;
use crate::command::clean::exclusion::Exclusions;
use crate::command::clean::executor::BoundedExecutor;
use crate::command::clean::report::DeletionReport;
use crate::command::clean::retention::{ManifestScope, RetentionPolicy};
use crate::command::clean::Error;
use crate::oci::ImageReference;
use crate::registry::{ManifestEntry, RegistryCatalog, RegistryContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WholeRepositoryReason {
    Empty,
    AllImagesEligible,
    Expired,
}

impl fmt::Display for WholeRepositoryReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WholeRepositoryReason::Empty => write!(f, "repository has no image"),
            WholeRepositoryReason::AllImagesEligible => {
                write!(f, "every image is eligible for deletion")
            }
            WholeRepositoryReason::Expired => write!(f, "repository was not updated recently"),
        }
    }
}

/// What will happen to one repository.
#[derive(Debug, PartialEq)]
pub enum RepositoryPlan {
    DeleteRepository {
        repository: String,
        reason: WholeRepositoryReason,
    },
    DeleteImages {
        repository: String,
        images: Vec<ManifestEntry>,
    },
    Retain {
        repository: String,
    },
}

impl RepositoryPlan {
    pub fn repository(&self) -> &str {
        match self {
            RepositoryPlan::DeleteRepository { repository, .. }
            | RepositoryPlan::DeleteImages { repository, .. }
            | RepositoryPlan::Retain { repository } => repository,
        }
    }
}

/// Plans and executes the cleaning of single repositories. One processor is
/// shared by every repository of a run.
pub struct RepositoryProcessor<'a> {
    pub context: &'a RegistryContext,
    pub catalog: &'a dyn RegistryCatalog,
    pub policy: RetentionPolicy,
    pub exclusions: &'a Exclusions,
    pub eol: &'a EolResolver,
    pub report: &'a DeletionReport,
    pub max_concurrent_deletes: usize,
    pub dry_run: bool,
    pub now: DateTime<Utc>,
}

impl RepositoryProcessor<'_> {
    #[instrument(skip(self))]
    pub async fn plan(&self, repository: &str) -> Result<RepositoryPlan, Error> {
        if self.policy.is_repository_scoped() {
            let properties = self.catalog.get_repository(self.context, repository).await?;

            return Ok(if self.policy.is_repository_eligible(&properties, self.now) {
                RepositoryPlan::DeleteRepository {
                    repository: repository.to_string(),
                    reason: WholeRepositoryReason::Expired,
                }
            } else {
                debug!(
                    "Repository '{}' updated on {}, kept",
                    properties.name, properties.last_updated_at
                );
                RepositoryPlan::Retain {
                    repository: repository.to_string(),
                }
            });
        }

        let manifests: Vec<ManifestEntry> = self
            .catalog
            .list_manifests(self.context, repository)
            .try_collect()
            .await?;

        if manifests.is_empty() {
            return Ok(RepositoryPlan::DeleteRepository {
                repository: repository.to_string(),
                reason: WholeRepositoryReason::Empty,
            });
        }

        let content = self.catalog.repository_content(repository);
        let scope = ManifestScope {
            context: self.context,
            content: content.as_ref(),
            eol: self.eol,
            now: self.now,
        };

        let decisions = try_join_all(
            manifests
                .iter()
                .map(|manifest| self.is_eligible(manifest, &scope)),
        )
        .await?;

        let eligible: Vec<ManifestEntry> = manifests
            .iter()
            .zip(decisions)
            .filter_map(|(manifest, eligible)| eligible.then(|| manifest.clone()))
            .collect();

        debug!(
            "{} of {} image(s) eligible for deletion",
            eligible.len(),
            manifests.len()
        );

        Ok(if eligible.len() == manifests.len() {
            RepositoryPlan::DeleteRepository {
                repository: repository.to_string(),
                reason: WholeRepositoryReason::AllImagesEligible,
            }
        } else if eligible.is_empty() {
            RepositoryPlan::Retain {
                repository: repository.to_string(),
            }
        } else {
            RepositoryPlan::DeleteImages {
                repository: repository.to_string(),
                images: eligible,
            }
        })
    }

    async fn is_eligible(
        &self,
        manifest: &ManifestEntry,
        scope: &ManifestScope<'_>,
    ) -> Result<bool, Error> {
        if self.exclusions.is_excluded(manifest) {
            debug!("Image {} is excluded", manifest.digest);
            return Ok(false);
        }

        self.policy.is_manifest_eligible(manifest, scope).await
    }

    #[instrument(skip(self, plan), fields(repository = plan.repository()))]
    pub async fn execute(&self, plan: &RepositoryPlan) -> Result<(), Error> {
        let prefix = if self.dry_run { "DRY RUN: " } else { "" };

        match plan {
            RepositoryPlan::DeleteRepository { repository, reason } => {
                info!("{prefix}Deleting repository '{repository}': {reason}");
                if !self.dry_run {
                    self.catalog
                        .delete_repository(self.context, repository)
                        .await?;
                }
                self.report.record_repository(repository);
            }
            RepositoryPlan::DeleteImages { repository, images } => {
                let content = self.catalog.repository_content(repository);
                let deletes = BoundedExecutor::new(self.max_concurrent_deletes);

                deletes
                    .run_all(images, |image| {
                        let content = content.as_ref();
                        async move {
                            let reference = ImageReference::new(
                                &self.context.registry,
                                repository,
                                &image.digest,
                            );

                            info!("{prefix}Deleting image '{reference}'");
                            if !self.dry_run {
                                content.delete_manifest(self.context, &image.digest).await?;
                            }
                            self.report.record_image(reference.to_string());
                            Ok(())
                        }
                    })
                    .await?;
            }
            RepositoryPlan::Retain { repository } => {
                debug!("Nothing to delete in '{repository}'");
            }
        }

        Ok(())
    }
}
