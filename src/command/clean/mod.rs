mod eol;
mod error;
mod exclusion;
mod executor;
mod processor;
mod report;
mod repository_filter;
mod retention;
#[cfg(test)]
mod test_utils;

use argh::FromArgs;
use chrono::{DateTime, Utc};
use futures_util::future::{self, join_all};
use futures_util::TryStreamExt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::configuration::{CleanConfig, Configuration};
use crate::registry::http_client::HttpClient;
use crate::registry::{
    ConfiguredCredentialProvider, CredentialProvider, HttpRegistryCatalog, LifecycleMetadata,
    ReferrersLifecycleMetadata, RegistryCatalog, RegistryContext,
};
use eol::EolResolver;
pub use error::Error;
use exclusion::Exclusions;
use processor::RepositoryProcessor;
use report::DeletionReport;
pub use report::RunSummary;
use repository_filter::RepositoryFilter;
use retention::{RetentionAction, RetentionPolicy};

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "clean",
    description = "Delete expired images and repositories from a registry"
)]
pub struct Options {
    #[argh(positional)]
    /// repositories to clean, as a glob supporting `*` and `?`
    pub repository: String,
    #[argh(option, short = 'a', default = "String::from(\"prune-dangling\")")]
    /// retention action: prune-dangling, prune-eol, prune-all or delete
    pub action: String,
    #[argh(option, default = "30")]
    /// age threshold in days, defaults to 30
    pub age: u32,
    #[argh(option, short = 'e')]
    /// image protected from deletion, as `repo@digest` or `repo:tag` (repeatable)
    pub exclude: Vec<String>,
}

/// Validated run parameters. Building them performs no I/O.
#[derive(Debug)]
pub struct CleanSettings {
    pub filter: RepositoryFilter,
    pub policy: RetentionPolicy,
    pub exclusions: Exclusions,
    pub max_concurrent_deletes: usize,
    pub dry_run: bool,
}

impl CleanSettings {
    pub fn new(options: &Options, config: &CleanConfig, dry_run: bool) -> Result<Self, Error> {
        let action: RetentionAction = options.action.parse()?;

        if action == RetentionAction::DeleteRepository && !options.exclude.is_empty() {
            return Err(Error::IncompatibleExclusions);
        }

        Ok(Self {
            filter: RepositoryFilter::new(&options.repository)?,
            policy: RetentionPolicy::new(action, options.age),
            exclusions: Exclusions::parse(&options.exclude)?,
            max_concurrent_deletes: config.max_concurrent_deletes,
            dry_run,
        })
    }
}

pub struct Command {
    settings: CleanSettings,
    registry_url: String,
    credentials: Arc<dyn CredentialProvider>,
    catalog: Arc<dyn RegistryCatalog>,
    eol: EolResolver,
}

impl Command {
    pub fn new(
        options: &Options,
        configuration: &Configuration,
        dry_run: bool,
    ) -> Result<Self, Error> {
        let settings = CleanSettings::new(options, &configuration.clean, dry_run)?;

        let registry = &configuration.registry;
        let client = Arc::new(HttpClient::new(&registry.http_client_config())?);

        Ok(Self::with_collaborators(
            settings,
            &registry.url,
            Arc::new(ConfiguredCredentialProvider::new(
                client.clone(),
                registry.credentials(),
            )),
            Arc::new(HttpRegistryCatalog::new(
                client.clone(),
                configuration.clean.page_size,
            )),
            Arc::new(ReferrersLifecycleMetadata::new(client)),
        ))
    }

    pub fn with_collaborators(
        settings: CleanSettings,
        registry_url: &str,
        credentials: Arc<dyn CredentialProvider>,
        catalog: Arc<dyn RegistryCatalog>,
        lifecycle: Arc<dyn LifecycleMetadata>,
    ) -> Self {
        if settings.dry_run {
            info!("Dry-run mode: no changes will be made to the registry");
        }

        Self {
            settings,
            registry_url: registry_url.to_string(),
            credentials,
            catalog,
            eol: EolResolver::new(lifecycle),
        }
    }

    pub async fn run(&self) -> Result<(), Error> {
        let summary = self.clean_at(Utc::now()).await?;

        if summary.is_complete() {
            Ok(())
        } else {
            Err(Error::Incomplete {
                failed: summary.failed_repositories.len(),
            })
        }
    }

    /// Cleans every matching repository, evaluating ages against `now`.
    ///
    /// Only authentication and catalog listing failures abort the run; a
    /// repository that cannot be processed is reported in the summary and the
    /// others carry on.
    ///
    /// Every matching repository is planned before any deletion starts, so
    /// nothing is deleted while another repository is still being evaluated.
    #[instrument(skip(self), fields(pattern = self.settings.filter.pattern()))]
    pub async fn clean_at(&self, now: DateTime<Utc>) -> Result<RunSummary, Error> {
        let context = self.credentials.authenticate(&self.registry_url).await?;
        let report = DeletionReport::default();

        let processor = RepositoryProcessor {
            context: &context,
            catalog: self.catalog.as_ref(),
            policy: self.settings.policy,
            exclusions: &self.settings.exclusions,
            eol: &self.eol,
            report: &report,
            max_concurrent_deletes: self.settings.max_concurrent_deletes,
            dry_run: self.settings.dry_run,
            now,
        };
        let processor = &processor;

        info!("Finding images to clean");
        let repositories = self.matching_repositories(&context).await?;
        info!(
            "{} repository(ies) match '{}', action {} with age {} and {} exclusion(s)",
            repositories.len(),
            self.settings.filter.pattern(),
            self.settings.policy.action(),
            self.settings.policy.age(),
            self.settings.exclusions.len()
        );

        let plans = join_all(
            repositories
                .iter()
                .map(|repository| async move { (repository, processor.plan(repository).await) }),
        )
        .await;

        let plans: Vec<_> = plans
            .into_iter()
            .filter_map(|(repository, plan)| match plan {
                Ok(plan) => Some(plan),
                Err(err) => {
                    error!("Failed to process repository '{repository}': {err}");
                    report.record_failure(repository, &err);
                    None
                }
            })
            .collect();

        info!("Deleting images");
        let outcomes = join_all(
            plans
                .iter()
                .map(|plan| async move { (plan.repository(), processor.execute(plan).await) }),
        )
        .await;

        for (repository, outcome) in outcomes {
            if let Err(err) = outcome {
                error!("Failed to clean repository '{repository}': {err}");
                report.record_failure(repository, &err);
            }
        }

        info!("Summary");
        let mut summary = report.summary(self.settings.dry_run);
        summary.remaining_repositories = self.count_repositories(&context).await;
        summary.log();

        Ok(summary)
    }

    async fn matching_repositories(&self, context: &RegistryContext) -> Result<Vec<String>, Error> {
        let filter = &self.settings.filter;

        let repositories: Vec<String> = self
            .catalog
            .list_repositories(context)
            .try_filter(|name| future::ready(filter.is_match(name)))
            .try_collect()
            .await?;

        Ok(repositories)
    }

    async fn count_repositories(&self, context: &RegistryContext) -> Option<usize> {
        let count = self
            .catalog
            .list_repositories(context)
            .try_fold(0, |count, _| future::ready(Ok(count + 1)))
            .await;

        match count {
            Ok(count) => Some(count),
            Err(err) => {
                warn!("Failed to count remaining repositories: {err}");
                None
            }
        }
    }
}
