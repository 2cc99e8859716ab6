//! Project store seam.
//!
//! - **ProjectStore**: trait the host's persistence layer implements
//! - **InMemoryStore**: lock-guarded maps, used by tests and demos
//!
//! The engine only reads sites and project records, and writes back the
//! computed insights. Writes overwrite; concurrent refreshes of one site are
//! last-writer-wins.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use log::debug;

use crate::error::StoreError;
use crate::insights::AiInsights;
use crate::model::ProjectRecord;
use crate::Site;

/// Read access to sites and project records plus the insight write-back.
///
/// Lookups return `Ok(None)` for absent records; `Err` is reserved for
/// failures of the backend itself.
pub trait ProjectStore: Send + Sync {
    fn site(&self, id: &str) -> Result<Option<Site>, StoreError>;

    fn sites(&self) -> Result<Vec<Site>, StoreError>;

    fn project(&self, site_id: &str) -> Result<Option<ProjectRecord>, StoreError>;

    /// All project records. Used by the cross-site resource analysis.
    fn projects(&self) -> Result<Vec<ProjectRecord>, StoreError>;

    /// Replace the cached insights on the site's project record.
    fn save_insights(&self, site_id: &str, insights: &AiInsights) -> Result<(), StoreError>;
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    "in-memory store lock poisoned".into()
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    sites: RwLock<Vec<Site>>,
    projects: RwLock<HashMap<String, ProjectRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from sites and their project records.
    pub fn with_records(sites: Vec<Site>, projects: Vec<ProjectRecord>) -> Self {
        Self {
            sites: RwLock::new(sites),
            projects: RwLock::new(projects.into_iter().map(|p| (p.site_id.clone(), p)).collect()),
        }
    }

    /// Insert or replace a site, keeping insertion order for new IDs.
    pub fn upsert_site(&self, site: Site) -> Result<(), StoreError> {
        let mut sites = self.sites.write().map_err(poisoned)?;
        match sites.iter_mut().find(|s| s.id == site.id) {
            Some(existing) => *existing = site,
            None => sites.push(site),
        }
        Ok(())
    }

    pub fn upsert_project(&self, project: ProjectRecord) -> Result<(), StoreError> {
        let mut projects = self.projects.write().map_err(poisoned)?;
        projects.insert(project.site_id.clone(), project);
        Ok(())
    }
}

impl ProjectStore for InMemoryStore {
    fn site(&self, id: &str) -> Result<Option<Site>, StoreError> {
        let sites = self.sites.read().map_err(poisoned)?;
        Ok(sites.iter().find(|s| s.id == id).cloned())
    }

    fn sites(&self) -> Result<Vec<Site>, StoreError> {
        Ok(self.sites.read().map_err(poisoned)?.clone())
    }

    fn project(&self, site_id: &str) -> Result<Option<ProjectRecord>, StoreError> {
        let projects = self.projects.read().map_err(poisoned)?;
        Ok(projects.get(site_id).cloned())
    }

    fn projects(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        let projects = self.projects.read().map_err(poisoned)?;
        let mut records: Vec<ProjectRecord> = projects.values().cloned().collect();
        records.sort_by(|a, b| a.site_id.cmp(&b.site_id));
        Ok(records)
    }

    fn save_insights(&self, site_id: &str, insights: &AiInsights) -> Result<(), StoreError> {
        let mut projects = self.projects.write().map_err(poisoned)?;
        let record = projects
            .get_mut(site_id)
            .ok_or_else(|| -> StoreError { format!("no project record for site {site_id}").into() })?;
        record.insights = Some(insights.clone());
        debug!("Saved insights for site {}", site_id);
        Ok(())
    }
}
