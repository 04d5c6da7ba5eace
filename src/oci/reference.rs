use std::fmt;
use std::fmt::{Display, Formatter};

use crate::oci::Digest;

/// Fully-qualified manifest reference: `registry/repository@digest`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub digest: Digest,
}

impl ImageReference {
    pub fn new(registry: &str, repository: &str, digest: &Digest) -> Self {
        Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            digest: digest.clone(),
        }
    }
}

impl Display for ImageReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.registry, self.repository, self.digest)
    }
}
