//! Historical sites and the repository that serves them.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Category sentinel that matches every site.
pub const ALL_CATEGORIES: &str = "all";

/// Opaque site identifier assigned by the backing store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub String);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A point of historical interest.
///
/// `categories` holds story-type tags such as "music" or "architecture".
/// A missing or null category list deserializes as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSite {
    pub id: SiteId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: GeoPoint,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub categories: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_text: Option<String>,
}

impl HistoricalSite {
    /// Whether the site carries any of the requested categories.
    ///
    /// The `all` sentinel in `requested` matches every site, including
    /// sites with no categories.
    pub fn matches_categories(&self, requested: &BTreeSet<String>) -> bool {
        requested.contains(ALL_CATEGORIES)
            || self.categories.iter().any(|c| requested.contains(c))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<BTreeSet<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Errors raised by a point repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("site store unreachable: {0}")]
    Unavailable(String),

    #[error("site store returned malformed data: {0}")]
    Malformed(String),
}

/// Source of every known historical site.
///
/// Implementations that paginate internally must return the full set.
#[async_trait]
pub trait PointRepository: Send + Sync {
    async fn list_all_sites(&self) -> Result<Vec<HistoricalSite>, RepositoryError>;
}

/// Repository backed by a fixed list, for hosts that hand sites over up front.
#[derive(Debug, Clone, Default)]
pub struct InMemorySiteRepository {
    sites: Vec<HistoricalSite>,
}

impl InMemorySiteRepository {
    pub fn new(sites: Vec<HistoricalSite>) -> Self {
        Self { sites }
    }

    /// Build from a JSON array of sites.
    pub fn from_json(json: &str) -> Result<Self, RepositoryError> {
        let sites = serde_json::from_str(json)
            .map_err(|e| RepositoryError::Malformed(e.to_string()))?;
        Ok(Self { sites })
    }
}

#[async_trait]
impl PointRepository for InMemorySiteRepository {
    async fn list_all_sites(&self) -> Result<Vec<HistoricalSite>, RepositoryError> {
        Ok(self.sites.clone())
    }
}

#[cfg(test)]
pub(crate) fn test_site(id: &str, lat: f64, lon: f64, categories: &[&str]) -> HistoricalSite {
    HistoricalSite {
        id: SiteId::from(id),
        title: format!("Site {id}"),
        description: format!("Description of {id}"),
        location: GeoPoint::new(lat, lon),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        narrative_text: None,
    }
}
