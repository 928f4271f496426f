use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a [`RepositoryRef`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryRefError {
    #[error("Project key must not be empty")]
    EmptyProjectKey,

    #[error("Repository slug must not be empty")]
    EmptyRepositorySlug,
}

/// Identifies a repository on the hosting server by project key and slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepositoryRef {
    project_key: String,
    repository_slug: String,
}

impl RepositoryRef {
    pub fn new(
        project_key: impl Into<String>,
        repository_slug: impl Into<String>,
    ) -> Result<Self, RepositoryRefError> {
        let project_key = project_key.into().trim().to_string();
        let repository_slug = repository_slug.into().trim().to_string();

        if project_key.is_empty() {
            return Err(RepositoryRefError::EmptyProjectKey);
        }
        if repository_slug.is_empty() {
            return Err(RepositoryRefError::EmptyRepositorySlug);
        }

        Ok(Self {
            project_key,
            repository_slug,
        })
    }

    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    pub fn repository_slug(&self) -> &str {
        &self.repository_slug
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project_key, self.repository_slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_ref_creation() {
        let repo = RepositoryRef::new("PROJ", "service").unwrap();

        assert_eq!(repo.project_key(), "PROJ");
        assert_eq!(repo.repository_slug(), "service");
        assert_eq!(repo.to_string(), "PROJ/service");
    }

    #[test]
    fn test_repository_ref_trims_whitespace() {
        let repo = RepositoryRef::new(" PROJ ", "service\n").unwrap();
        assert_eq!(repo.to_string(), "PROJ/service");
    }

    #[test]
    fn test_repository_ref_rejects_empty_parts() {
        assert_eq!(
            RepositoryRef::new("", "service"),
            Err(RepositoryRefError::EmptyProjectKey)
        );
        assert_eq!(
            RepositoryRef::new("PROJ", "  "),
            Err(RepositoryRefError::EmptyRepositorySlug)
        );
    }
}
