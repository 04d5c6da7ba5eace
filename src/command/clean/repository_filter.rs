use regex::Regex;

use crate::command::clean::Error;

/// Anchored repository name matcher built from a glob supporting `*` and `?`.
#[derive(Debug)]
pub struct RepositoryFilter {
    pattern: String,
    regex: Regex,
}

impl RepositoryFilter {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        if pattern.is_empty() {
            return Err(Error::InvalidRepositoryPattern(pattern.to_string()));
        }

        let expression = regex::escape(pattern)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");

        let regex = Regex::new(&format!("^{expression}$"))
            .map_err(|_| Error::InvalidRepositoryPattern(pattern.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, repository: &str) -> bool {
        self.regex.is_match(repository)
    }
}
