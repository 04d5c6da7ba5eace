use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

use crate::command::clean::eol::EolResolver;
use crate::command::clean::Error;
use crate::oci::ImageReference;
use crate::registry::{ManifestEntry, RegistryContext, RepositoryContent, RepositoryProperties};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionAction {
    PruneDangling,
    PruneEndOfLife,
    PruneAll,
    DeleteRepository,
}

impl FromStr for RetentionAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "prunedangling" => Ok(RetentionAction::PruneDangling),
            "pruneeol" | "pruneendoflife" => Ok(RetentionAction::PruneEndOfLife),
            "pruneall" => Ok(RetentionAction::PruneAll),
            "delete" | "deleterepository" => Ok(RetentionAction::DeleteRepository),
            _ => Err(Error::UnsupportedAction(s.to_string())),
        }
    }
}

impl fmt::Display for RetentionAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RetentionAction::PruneDangling => "prune-dangling",
            RetentionAction::PruneEndOfLife => "prune-eol",
            RetentionAction::PruneAll => "prune-all",
            RetentionAction::DeleteRepository => "delete",
        };
        write!(f, "{name}")
    }
}

/// Age threshold in days; a timestamp expires once it is strictly older.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgeThreshold {
    days: u32,
}

impl AgeThreshold {
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    pub fn is_expired(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        timestamp
            .checked_add_signed(Duration::days(i64::from(self.days)))
            .is_some_and(|limit| limit < now)
    }
}

impl fmt::Display for AgeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} day(s)", self.days)
    }
}

/// What the manifest-level policies need beyond the manifest itself.
pub struct ManifestScope<'a> {
    pub context: &'a RegistryContext,
    pub content: &'a dyn RepositoryContent,
    pub eol: &'a EolResolver,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RetentionPolicy {
    PruneDangling(AgeThreshold),
    PruneEndOfLife(AgeThreshold),
    PruneAll(AgeThreshold),
    DeleteRepository(AgeThreshold),
}

impl RetentionPolicy {
    pub fn new(action: RetentionAction, age_days: u32) -> Self {
        let age = AgeThreshold::days(age_days);
        match action {
            RetentionAction::PruneDangling => RetentionPolicy::PruneDangling(age),
            RetentionAction::PruneEndOfLife => RetentionPolicy::PruneEndOfLife(age),
            RetentionAction::PruneAll => RetentionPolicy::PruneAll(age),
            RetentionAction::DeleteRepository => RetentionPolicy::DeleteRepository(age),
        }
    }

    pub fn action(&self) -> RetentionAction {
        match self {
            RetentionPolicy::PruneDangling(_) => RetentionAction::PruneDangling,
            RetentionPolicy::PruneEndOfLife(_) => RetentionAction::PruneEndOfLife,
            RetentionPolicy::PruneAll(_) => RetentionAction::PruneAll,
            RetentionPolicy::DeleteRepository(_) => RetentionAction::DeleteRepository,
        }
    }

    pub fn age(&self) -> AgeThreshold {
        match self {
            RetentionPolicy::PruneDangling(age)
            | RetentionPolicy::PruneEndOfLife(age)
            | RetentionPolicy::PruneAll(age)
            | RetentionPolicy::DeleteRepository(age) => *age,
        }
    }

    /// Repository-level policies decide from repository properties alone and
    /// never enumerate manifests.
    pub fn is_repository_scoped(&self) -> bool {
        matches!(self, RetentionPolicy::DeleteRepository(_))
    }

    pub fn is_repository_eligible(
        &self,
        repository: &RepositoryProperties,
        now: DateTime<Utc>,
    ) -> bool {
        match self {
            RetentionPolicy::DeleteRepository(age) => {
                age.is_expired(repository.last_updated_at, now)
            }
            _ => false,
        }
    }

    pub async fn is_manifest_eligible(
        &self,
        manifest: &ManifestEntry,
        scope: &ManifestScope<'_>,
    ) -> Result<bool, Error> {
        match self {
            RetentionPolicy::PruneDangling(age) => Ok(prune_dangling(*age, manifest, scope.now)),
            RetentionPolicy::PruneAll(age) => Ok(prune_all(*age, manifest, scope.now)),
            RetentionPolicy::PruneEndOfLife(age) => {
                prune_end_of_life(*age, manifest, scope).await
            }
            RetentionPolicy::DeleteRepository(_) => Ok(false),
        }
    }
}

fn prune_dangling(age: AgeThreshold, manifest: &ManifestEntry, now: DateTime<Utc>) -> bool {
    manifest.is_dangling() && age.is_expired(manifest.last_updated_at, now)
}

fn prune_all(age: AgeThreshold, manifest: &ManifestEntry, now: DateTime<Utc>) -> bool {
    age.is_expired(manifest.last_updated_at, now)
}

// Annotation manifests are never deleted on their own: they go away with
// their subject or with the repository.
async fn prune_end_of_life(
    age: AgeThreshold,
    manifest: &ManifestEntry,
    scope: &ManifestScope<'_>,
) -> Result<bool, Error> {
    if scope
        .eol
        .is_annotation(scope.context, scope.content, &manifest.digest)
        .await?
    {
        return Ok(false);
    }

    let reference = ImageReference::new(
        &scope.context.registry,
        &manifest.repository,
        &manifest.digest,
    );

    Ok(scope
        .eol
        .end_of_life(scope.context, &reference)
        .await?
        .is_some_and(|annotation| age.is_expired(annotation.end_of_life, scope.now)))
}
