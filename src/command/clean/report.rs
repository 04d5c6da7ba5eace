use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::command::clean::Error;

/// Deletions and failures recorded while the repositories are processed
/// concurrently.
#[derive(Debug, Default)]
pub struct DeletionReport {
    repositories: Mutex<Vec<String>>,
    images: Mutex<Vec<String>>,
    failures: Mutex<Vec<(String, String)>>,
}

// A panicking recorder cannot leave a half-pushed Vec behind, so a poisoned
// lock still guards consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeletionReport {
    pub fn record_repository(&self, repository: &str) {
        lock(&self.repositories).push(repository.to_string());
    }

    pub fn record_image(&self, image: String) {
        lock(&self.images).push(image);
    }

    pub fn record_failure(&self, repository: &str, error: &Error) {
        lock(&self.failures).push((repository.to_string(), error.to_string()));
    }

    pub fn summary(&self, dry_run: bool) -> RunSummary {
        let mut deleted_repositories = lock(&self.repositories).clone();
        let mut deleted_images = lock(&self.images).clone();
        let mut failed_repositories = lock(&self.failures).clone();

        deleted_repositories.sort();
        deleted_images.sort();
        failed_repositories.sort();

        RunSummary {
            dry_run,
            deleted_repositories,
            deleted_images,
            failed_repositories,
            remaining_repositories: None,
        }
    }
}

/// Outcome of a cleaning run.
///
/// In dry-run mode the deletion lists hold what would have been deleted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub dry_run: bool,
    pub deleted_repositories: Vec<String>,
    /// Fully-qualified `registry/repository@digest` references.
    pub deleted_images: Vec<String>,
    /// Repository name and the error that stopped its processing.
    pub failed_repositories: Vec<(String, String)>,
    pub remaining_repositories: Option<usize>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_repositories.is_empty()
    }

    pub fn log(&self) {
        let prefix = if self.dry_run { "DRY RUN: " } else { "" };

        info!(
            "{prefix}Deleted repositories ({}):",
            self.deleted_repositories.len()
        );
        for repository in &self.deleted_repositories {
            info!("{prefix}  {repository}");
        }

        info!("{prefix}Deleted images ({}):", self.deleted_images.len());
        for image in &self.deleted_images {
            info!("{prefix}  {image}");
        }

        if !self.failed_repositories.is_empty() {
            warn!(
                "Repositories that could not be processed ({}):",
                self.failed_repositories.len()
            );
            for (repository, error) in &self.failed_repositories {
                warn!("  {repository}: {error}");
            }
        }

        if let Some(remaining) = self.remaining_repositories {
            info!("{prefix}Total repositories remaining: {remaining}");
        }
    }
}
