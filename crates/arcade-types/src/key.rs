//! Remote object keys.
//!
//! Every file of every bundle lives in the remote store under
//!
//! ```text
//! <prefix>/<bundle-id>/<relative/path/with/forward/slashes>
//! ```
//!
//! and locally under `<content-root>/<bundle-id>/<relative/path>`. The two
//! forms are inverses of each other given the prefix and the content root.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::bundle::BundleId;
use crate::error::TypeError;

/// Key of one bundle file in the remote store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteKey {
    prefix: String,
    bundle: BundleId,
    path: String,
}

impl RemoteKey {
    /// Build a key from its parts.
    ///
    /// `path` is relative to the bundle root; backslashes are converted to
    /// forward slashes. Paths with empty, `.` or `..` segments are rejected.
    pub fn new(
        prefix: impl Into<String>,
        bundle: BundleId,
        path: impl AsRef<str>,
    ) -> Result<Self, TypeError> {
        let path = path.as_ref().replace('\\', "/");
        validate_relative(&path)?;
        Ok(Self {
            prefix: trim_prefix(prefix.into()),
            bundle,
            path,
        })
    }

    /// Build a key from a path relative to the bundle root on disk.
    pub fn from_relative_path(
        prefix: impl Into<String>,
        bundle: BundleId,
        rel: &Path,
    ) -> Result<Self, TypeError> {
        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                std::path::Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| TypeError::InvalidPath {
                        path: rel.display().to_string(),
                        reason: "not valid UTF-8".into(),
                    })?;
                    parts.push(part);
                }
                _ => {
                    return Err(TypeError::InvalidPath {
                        path: rel.display().to_string(),
                        reason: "must be a plain relative path".into(),
                    })
                }
            }
        }
        Self::new(prefix, bundle, parts.join("/"))
    }

    /// Parse a key listed from the remote store.
    ///
    /// The key must start with `<prefix>/`, continue with a canonical
    /// [`BundleId`], and end with a clean relative path.
    pub fn parse(prefix: &str, key: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidRemoteKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let prefix = trim_prefix(prefix.to_string());
        let rest = if prefix.is_empty() {
            key
        } else {
            key.strip_prefix(prefix.as_str())
                .and_then(|r| r.strip_prefix('/'))
                .ok_or_else(|| invalid("outside the bundle prefix"))?
        };

        let (bundle, path) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing bundle path"))?;
        let bundle = BundleId::parse(bundle).map_err(|_| invalid("bad bundle id"))?;
        if path.contains('\\') {
            return Err(invalid("backslash in path"));
        }
        validate_relative(path).map_err(|_| invalid("unsafe relative path"))?;

        Ok(Self {
            prefix,
            bundle,
            path: path.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn bundle(&self) -> BundleId {
        self.bundle
    }

    /// Path relative to the bundle root, forward-slash separated.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Prefix shared by every key of one bundle, including the trailing `/`.
    pub fn bundle_prefix(prefix: &str, bundle: &BundleId) -> String {
        let prefix = trim_prefix(prefix.to_string());
        if prefix.is_empty() {
            format!("{bundle}/")
        } else {
            format!("{prefix}/{bundle}/")
        }
    }

    /// Local file this key maps to under `content_root`.
    pub fn to_local_path(&self, content_root: &Path) -> PathBuf {
        let mut out = content_root.join(self.bundle.to_string());
        for segment in self.path.split('/') {
            out.push(segment);
        }
        out
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}/{}", self.bundle, self.path)
        } else {
            write!(f, "{}/{}/{}", self.prefix, self.bundle, self.path)
        }
    }
}

fn trim_prefix(prefix: String) -> String {
    prefix.trim_matches('/').to_string()
}

fn validate_relative(path: &str) -> Result<(), TypeError> {
    let fail = |reason: &str| {
        Err(TypeError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        })
    };
    if path.is_empty() {
        return fail("empty path");
    }
    if path.contains('\0') {
        return fail("contains NUL");
    }
    for segment in path.split('/') {
        match segment {
            "" => return fail("empty segment"),
            "." | ".." => return fail("relative segment"),
            _ => {}
        }
    }
    Ok(())
}
