//! # Tracked Projects
//!
//! The registry is built once from configuration and then only read. Order
//! matters: a project's position is what the batch query aliases and the
//! response mapping are keyed on, so two entries with the same name still
//! resolve independently.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// A repository identified by its owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    /// Account or organisation that owns the repository.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl Project {
    /// Creates a project from its two parts.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for Project {
    type Err = RegistryError;

    /// Parses `owner/name`. Surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.trim().is_empty() && !name.trim().is_empty() && !name.contains('/') =>
            {
                Ok(Project::new(owner.trim(), name.trim()))
            }
            _ => Err(RegistryError::InvalidProject(s.to_string())),
        }
    }
}

/// Popularity numbers for one project, as pushed to viewers.
///
/// Serializes exactly as `{"name":..,"stars":..,"forks":..}`; `name` is the
/// correlation key the browser uses to find the element to update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    /// Repository name as reported by the provider.
    pub name: String,
    /// Star count.
    pub stars: u64,
    /// Fork count.
    pub forks: u64,
}

/// The ordered, read-only list of tracked projects.
#[derive(Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: Vec<Project>,
}

impl ProjectRegistry {
    /// Wraps the configured projects, keeping their order.
    ///
    /// Duplicates are kept (each is fetched on its own) but logged, since
    /// viewers correlate by name and would see them collide.
    pub fn new(projects: Vec<Project>) -> Self {
        let mut seen = HashSet::new();
        for project in &projects {
            if !seen.insert(project) {
                log::warn!("Project {} is tracked more than once", project);
            }
        }
        if projects.is_empty() {
            log::warn!("Project registry is empty; every fetch will fail with empty_batch");
        }
        Self { projects }
    }

    /// Parses a list of `owner/name` strings.
    pub fn from_specs<I, S>(specs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let projects = specs
            .into_iter()
            .map(|s| s.as_ref().parse::<Project>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(projects))
    }

    /// The list tracked when nothing is configured.
    pub fn default_projects() -> Vec<Project> {
        vec![
            Project::new("tiangolo", "fastapi"),
            Project::new("encode", "starlette"),
            Project::new("pallets", "flask"),
            Project::new("django", "django"),
            Project::new("seapagan", "fastapi-template"),
        ]
    }

    /// Projects in registry order.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Number of tracked projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
