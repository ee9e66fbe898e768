//! Archive entry path validation.
//!
//! Entry names come from an untrusted archive. An entry is safe when its
//! name, cleaned lexically and joined onto the absolute destination root,
//! lands strictly below that root:
//!
//! - `..` segments may not climb out of the root
//! - absolute names (`/etc/passwd`, `\evil`, `C:\evil`) are rejected outright
//! - the root itself is not a valid target
//! - containment is compared component-wise, so a root of `games/abc`
//!   never admits `games/abcdef/...`
//!
//! Backslashes are treated as separators so that `..\..\x` is caught the
//! same way as `../../x`.

use std::path::{Component, Path, PathBuf};

/// Entry prefixes skipped before any validation (macOS Finder metadata).
pub const DEFAULT_IGNORABLE_PREFIXES: &[&str] = &["__MACOSX/"];

/// An entry path confirmed to resolve inside a destination root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedPath {
    relative: PathBuf,
    absolute: PathBuf,
}

impl ValidatedPath {
    /// Cleaned path relative to the root; never empty.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// `absolute(root)/relative`.
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }
}

/// Whether an entry is archive-tool metadata that should be skipped.
pub fn is_ignorable<S: AsRef<str>>(entry: &str, prefixes: &[S]) -> bool {
    prefixes.iter().any(|p| entry.starts_with(p.as_ref()))
}

/// Resolve `entry` against `dest_root`, returning `None` if it escapes.
pub fn validate(entry: &str, dest_root: &Path) -> Option<ValidatedPath> {
    if entry.is_empty() || entry.contains('\0') {
        return None;
    }
    let normalized = entry.replace('\\', "/");
    if normalized.starts_with('/') {
        return None;
    }
    if has_drive_prefix(&normalized) {
        return None;
    }

    let root = clean(&std::path::absolute(dest_root).ok()?);
    let resolved = clean(&root.join(&normalized));

    if resolved == root || !resolved.starts_with(&root) {
        return None;
    }
    let relative = resolved.strip_prefix(&root).ok()?.to_path_buf();
    Some(ValidatedPath {
        relative,
        absolute: resolved,
    })
}

/// Whether `entry` resolves strictly inside `dest_root`.
pub fn is_safe(entry: &str, dest_root: &Path) -> bool {
    validate(entry, dest_root).is_some()
}

/// Drive-qualified names such as `C:/x` or `C:x`. Colons elsewhere are
/// ordinary filename characters.
fn has_drive_prefix(entry: &str) -> bool {
    let bytes = entry.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Lexical cleanup: drops `.` and empty segments and folds `..` into its
/// parent. A `..` at an absolute root stays at the root.
fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}
