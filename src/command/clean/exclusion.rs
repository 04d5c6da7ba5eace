use std::str::FromStr;

use crate::command::clean::Error;
use crate::oci::Digest;
use crate::registry::ManifestEntry;

#[derive(Clone, Debug, PartialEq)]
pub enum ExclusionTarget {
    Digest(Digest),
    Tag(String),
}

/// Protects a manifest from deletion, written `repo@digest` or `repo:tag`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExclusionSpec {
    pub repository: String,
    pub target: ExclusionTarget,
}

impl ExclusionSpec {
    pub fn matches(&self, manifest: &ManifestEntry) -> bool {
        if manifest.repository != self.repository {
            return false;
        }

        match &self.target {
            ExclusionTarget::Digest(digest) => &manifest.digest == digest,
            ExclusionTarget::Tag(tag) => manifest.tags.iter().any(|t| t == tag),
        }
    }
}

impl FromStr for ExclusionSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidExclusion(s.to_string());

        let (repository, target) = if let Some((repository, digest)) = s.split_once('@') {
            let digest = digest.parse().map_err(|_| invalid())?;
            (repository, ExclusionTarget::Digest(digest))
        } else if let Some((repository, tag)) = s.rsplit_once(':') {
            if tag.is_empty() || tag.contains('/') {
                return Err(invalid());
            }
            (repository, ExclusionTarget::Tag(tag.to_string()))
        } else {
            return Err(invalid());
        };

        if repository.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            repository: repository.to_string(),
            target,
        })
    }
}

#[derive(Debug, Default)]
pub struct Exclusions(Vec<ExclusionSpec>);

impl Exclusions {
    pub fn parse(specs: &[String]) -> Result<Self, Error> {
        specs
            .iter()
            .map(|spec| spec.parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_excluded(&self, manifest: &ManifestEntry) -> bool {
        self.0.iter().any(|spec| spec.matches(manifest))
    }
}
