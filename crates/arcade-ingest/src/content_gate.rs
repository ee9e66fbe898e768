//! Extension allow-list for archive entries.
//!
//! Bundles are static sites: markup, scripts, styles, images, audio,
//! video, fonts and plain data. Anything else (server-side scripts,
//! executables, dotfiles such as `.htaccess`) is refused.
//!
//! Directory entries and files without any dot in their final name pass.
//! Extensionless files are common build-tool output and carry no
//! content-type of their own when served.

use std::collections::HashSet;

/// Extensions accepted out of the box.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".html", ".htm", ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".mp3", ".wav",
    ".ogg", ".mp4", ".webm", ".json", ".xml", ".txt", ".woff", ".woff2", ".ttf", ".eot", ".ico",
    ".manifest",
];

/// Lowercased extension of the final path element, including the dot.
///
/// The extension starts at the last `.` of the final element, so
/// `.htaccess` has extension `.htaccess` and `name.` has extension `.`.
/// Returns `None` when the final element has no dot or is empty.
pub fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.rfind('.').map(|idx| base[idx..].to_ascii_lowercase())
}

/// Allow-list gate for archive entries.
#[derive(Clone, Debug)]
pub struct ContentTypeGate {
    allowed: HashSet<String>,
}

impl ContentTypeGate {
    /// A gate with the default list plus `extra` extensions.
    ///
    /// Extra entries are normalized to lowercase with a leading dot, so
    /// `"WASM"` and `".wasm"` are equivalent.
    pub fn new<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut allowed: HashSet<String> = DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect();
        for ext in extra {
            let ext = ext.as_ref().trim().to_ascii_lowercase();
            if ext.is_empty() || ext == "." {
                continue;
            }
            if ext.starts_with('.') {
                allowed.insert(ext);
            } else {
                allowed.insert(format!(".{ext}"));
            }
        }
        Self { allowed }
    }

    /// Whether an entry may be extracted.
    pub fn is_allowed(&self, name: &str, is_dir: bool) -> bool {
        if is_dir || name.ends_with('/') {
            return true;
        }
        match extension_of(name) {
            None => true,
            Some(ext) => self.allowed.contains(&ext),
        }
    }
}

impl Default for ContentTypeGate {
    fn default() -> Self {
        Self::new::<&str>(&[])
    }
}

/// Check an entry name against the default allow-list.
pub fn is_allowed(name: &str) -> bool {
    ContentTypeGate::default().is_allowed(name, false)
}
