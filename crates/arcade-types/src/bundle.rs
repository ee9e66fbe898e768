use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of one uploaded bundle.
///
/// A UUID v7: globally unique and ordered by creation time, so sorting
/// bundle ids sorts bundles oldest-first. The id is also the name of the
/// bundle's directory in the content store and its segment in remote keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(uuid::Uuid);

impl BundleId {
    /// Generate a new time-ordered bundle ID (UUID v7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Parse the canonical lowercase hyphenated form.
    ///
    /// Braced, simple, URN and uppercase spellings are rejected: the id
    /// doubles as a directory name, so exactly one spelling may be valid.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let uuid =
            uuid::Uuid::parse_str(s).map_err(|_| TypeError::InvalidBundleId(s.to_string()))?;
        let canonical = uuid.hyphenated().to_string();
        if canonical != s {
            return Err(TypeError::InvalidBundleId(s.to_string()));
        }
        Ok(Self(uuid))
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Creation time embedded in the identifier.
    ///
    /// `None` for ids that are not time-based (e.g. a v4 id parsed from a
    /// foreign remote key).
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let (secs, nanos) = self.0.get_timestamp()?.to_unix();
        DateTime::<Utc>::from_timestamp(secs as i64, nanos)
    }

    /// Short representation (first 8 characters of UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for BundleId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for BundleId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BundleId({})", self.short_id())
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One extracted bundle in the content store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bundle {
    id: BundleId,
    root: PathBuf,
}

impl Bundle {
    pub fn new(id: BundleId, root: impl Into<PathBuf>) -> Self {
        Self { id, root: root.into() }
    }

    pub fn id(&self) -> BundleId {
        self.id
    }

    /// Directory holding the bundle's files. Its final component is the id.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.id.created_at()
    }

    pub fn playback_path(&self) -> String {
        playback_path(&self.id)
    }
}

/// Caller-visible path under which a bundle's entry page is served.
pub fn playback_path(id: &BundleId) -> String {
    format!("/play/{id}/")
}
