use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use hyper::StatusCode;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::oci::{Descriptor, Digest, ImageReference, Manifest};
use crate::registry::{
    EolAnnotation, Error, LifecycleMetadata, ManifestEntry, RegistryCatalog, RegistryContext,
    RepositoryContent, RepositoryProperties,
};

const IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

pub fn context() -> RegistryContext {
    RegistryContext {
        registry: "example.azurecr.io".to_string(),
        url: "https://example.azurecr.io".to_string(),
        credentials: None,
    }
}

pub fn digest(hash: char) -> Digest {
    Digest::Sha256(hash.to_string().repeat(64))
}

fn image_body() -> Vec<u8> {
    let manifest = Manifest {
        media_type: Some(IMAGE_MANIFEST.to_string()),
        config: Some(Descriptor {
            media_type: "application/vnd.oci.image.config.v1+json".to_string(),
            digest: digest('0').to_string(),
            size: 2,
            ..Descriptor::default()
        }),
        ..Manifest::default()
    };
    serde_json::to_vec(&manifest).unwrap()
}

fn annotation_body(subject: &Digest) -> Vec<u8> {
    let manifest = Manifest {
        media_type: Some(IMAGE_MANIFEST.to_string()),
        artifact_type: Some("application/vnd.microsoft.artifact.lifecycle".to_string()),
        subject: Some(Descriptor {
            media_type: IMAGE_MANIFEST.to_string(),
            digest: subject.to_string(),
            size: 512,
            ..Descriptor::default()
        }),
        ..Manifest::default()
    };
    serde_json::to_vec(&manifest).unwrap()
}

struct FakeRepository {
    last_updated_at: DateTime<Utc>,
    manifests: Vec<ManifestEntry>,
    bodies: HashMap<Digest, Vec<u8>>,
}

#[derive(Default)]
struct State {
    repositories: BTreeMap<String, FakeRepository>,
    deleted_repositories: Vec<String>,
    deleted_manifests: Vec<String>,
    failing_listings: HashSet<String>,
    failing_deletes: HashSet<Digest>,
    failing_catalog: bool,
    manifest_listings: usize,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    reads_in_flight: AtomicUsize,
    peak_reads_in_flight: AtomicUsize,
}

/// In-memory registry recording every mutating call.
#[derive(Clone, Default)]
pub struct FakeRegistry {
    inner: Arc<Inner>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap()
    }

    pub fn with_repository(self, name: &str, last_updated_at: DateTime<Utc>) -> Self {
        self.state().repositories.insert(
            name.to_string(),
            FakeRepository {
                last_updated_at,
                manifests: Vec::new(),
                bodies: HashMap::new(),
            },
        );
        self
    }

    pub fn with_manifest(
        self,
        repository: &str,
        digest: Digest,
        tags: &[&str],
        last_updated_at: DateTime<Utc>,
    ) -> Self {
        self.insert_manifest(repository, digest, tags, last_updated_at, image_body());
        self
    }

    /// Adds an untagged lifecycle annotation manifest attached to `subject`.
    pub fn with_annotation(
        self,
        repository: &str,
        digest: Digest,
        subject: &Digest,
        last_updated_at: DateTime<Utc>,
    ) -> Self {
        let body = annotation_body(subject);
        self.insert_manifest(repository, digest, &[], last_updated_at, body);
        self
    }

    pub fn with_manifest_body(self, repository: &str, digest: &Digest, body: Vec<u8>) -> Self {
        if let Some(repository) = self.state().repositories.get_mut(repository) {
            repository.bodies.insert(digest.clone(), body);
        }
        self
    }

    pub fn with_failing_listing(self, repository: &str) -> Self {
        self.state().failing_listings.insert(repository.to_string());
        self
    }

    pub fn with_failing_delete(self, digest: Digest) -> Self {
        self.state().failing_deletes.insert(digest);
        self
    }

    pub fn with_failing_catalog(self) -> Self {
        self.state().failing_catalog = true;
        self
    }

    fn insert_manifest(
        &self,
        repository: &str,
        digest: Digest,
        tags: &[&str],
        last_updated_at: DateTime<Utc>,
        body: Vec<u8>,
    ) {
        let mut state = self.state();
        let repository_state = state
            .repositories
            .get_mut(repository)
            .expect("repository must be added before its manifests");

        repository_state.bodies.insert(digest.clone(), body);
        repository_state.manifests.push(ManifestEntry {
            repository: repository.to_string(),
            digest,
            tags: tags.iter().map(ToString::to_string).collect(),
            last_updated_at,
        });
    }

    pub fn repositories(&self) -> Vec<String> {
        self.state().repositories.keys().cloned().collect()
    }

    pub fn manifests(&self, repository: &str) -> Vec<Digest> {
        self.state()
            .repositories
            .get(repository)
            .map(|r| r.manifests.iter().map(|m| m.digest.clone()).collect())
            .unwrap_or_default()
    }

    pub fn deleted_repositories(&self) -> Vec<String> {
        self.state().deleted_repositories.clone()
    }

    /// Deleted manifests, as `repository@digest`.
    pub fn deleted_manifests(&self) -> Vec<String> {
        self.state().deleted_manifests.clone()
    }

    pub fn manifest_listings(&self) -> usize {
        self.state().manifest_listings
    }

    pub fn peak_concurrent_deletes(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_concurrent_reads(&self) -> usize {
        self.inner.peak_reads_in_flight.load(Ordering::SeqCst)
    }

    fn not_found(location: &str) -> Error {
        Error::UnexpectedStatus {
            status: StatusCode::NOT_FOUND,
            location: location.to_string(),
        }
    }
}

#[async_trait]
impl RegistryCatalog for FakeRegistry {
    fn list_repositories<'a>(
        &'a self,
        _context: &'a RegistryContext,
    ) -> BoxStream<'a, Result<String, Error>> {
        let state = self.state();
        if state.failing_catalog {
            return stream::iter(vec![Err(Error::Internal("catalog unavailable".to_string()))])
                .boxed();
        }

        let names: Vec<Result<String, Error>> =
            state.repositories.keys().cloned().map(Ok).collect();
        stream::iter(names).boxed()
    }

    async fn get_repository(
        &self,
        _context: &RegistryContext,
        name: &str,
    ) -> Result<RepositoryProperties, Error> {
        let state = self.state();
        let repository = state
            .repositories
            .get(name)
            .ok_or_else(|| Self::not_found(name))?;

        Ok(RepositoryProperties {
            name: name.to_string(),
            last_updated_at: repository.last_updated_at,
        })
    }

    fn list_manifests<'a>(
        &'a self,
        _context: &'a RegistryContext,
        repository: &'a str,
    ) -> BoxStream<'a, Result<ManifestEntry, Error>> {
        let mut state = self.state();
        state.manifest_listings += 1;

        if state.failing_listings.contains(repository) {
            return stream::iter(vec![Err(Error::Internal(format!(
                "listing of {repository} failed"
            )))])
            .boxed();
        }

        let manifests: Vec<Result<ManifestEntry, Error>> = state
            .repositories
            .get(repository)
            .map(|r| r.manifests.iter().cloned().map(Ok).collect())
            .unwrap_or_else(|| vec![Err(Self::not_found(repository))]);
        stream::iter(manifests).boxed()
    }

    async fn delete_repository(&self, _context: &RegistryContext, name: &str) -> Result<(), Error> {
        let mut state = self.state();
        state
            .repositories
            .remove(name)
            .ok_or_else(|| Self::not_found(name))?;
        state.deleted_repositories.push(name.to_string());
        Ok(())
    }

    fn repository_content(&self, repository: &str) -> Arc<dyn RepositoryContent> {
        Arc::new(FakeRepositoryContent {
            registry: self.clone(),
            repository: repository.to_string(),
        })
    }
}

pub struct FakeRepositoryContent {
    registry: FakeRegistry,
    repository: String,
}

#[async_trait]
impl RepositoryContent for FakeRepositoryContent {
    async fn get_manifest(
        &self,
        _context: &RegistryContext,
        digest: &Digest,
    ) -> Result<Vec<u8>, Error> {
        let inner = &self.registry.inner;
        let in_flight = inner.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak_reads_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;
        inner.reads_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.registry
            .state()
            .repositories
            .get(&self.repository)
            .and_then(|r| r.bodies.get(digest).cloned())
            .ok_or_else(|| FakeRegistry::not_found(&digest.to_string()))
    }

    async fn delete_manifest(
        &self,
        _context: &RegistryContext,
        digest: &Digest,
    ) -> Result<(), Error> {
        let inner = &self.registry.inner;
        let in_flight = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;
        inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.registry.state();
        if state.failing_deletes.contains(digest) {
            return Err(Error::Internal(format!("delete of {digest} failed")));
        }

        let repository = state
            .repositories
            .get_mut(&self.repository)
            .ok_or_else(|| FakeRegistry::not_found(&self.repository))?;
        repository.manifests.retain(|m| &m.digest != digest);
        repository.bodies.remove(digest);

        state
            .deleted_manifests
            .push(format!("{}@{digest}", self.repository));
        Ok(())
    }
}

/// Lifecycle metadata keyed by the annotated image digest.
#[derive(Default)]
pub struct FakeLifecycle {
    end_of_life: HashMap<Digest, DateTime<Utc>>,
}

impl FakeLifecycle {
    pub fn with_end_of_life(mut self, digest: Digest, end_of_life: DateTime<Utc>) -> Self {
        self.end_of_life.insert(digest, end_of_life);
        self
    }
}

#[async_trait]
impl LifecycleMetadata for FakeLifecycle {
    async fn end_of_life(
        &self,
        _context: &RegistryContext,
        reference: &ImageReference,
    ) -> Result<Option<EolAnnotation>, Error> {
        Ok(self
            .end_of_life
            .get(&reference.digest)
            .map(|end_of_life| EolAnnotation {
                digest: digest('e'),
                end_of_life: *end_of_life,
            }))
    }
}
