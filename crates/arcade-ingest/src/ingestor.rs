use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use arcade_store::ContentStore;
use arcade_types::{playback_path, Bundle, BundleId};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::config::IngestConfig;
use crate::content_gate::ContentTypeGate;
use crate::error::{IngestError, IngestResult};
use crate::path_safety::{is_ignorable, validate};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Outcome of a successful ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestReceipt {
    pub bundle_id: BundleId,
    /// Directory the bundle was extracted into.
    pub root: PathBuf,
    /// Where the bundle's entry page is served, e.g. `/play/<id>/`.
    pub playback_path: String,
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

#[derive(Default)]
struct ExtractStats {
    files: usize,
    directories: usize,
    bytes: u64,
}

/// Validates untrusted zip uploads and extracts them as new bundles.
///
/// Each call to [`ingest`](Self::ingest) creates its own uniquely named
/// bundle directory, so concurrent ingestions never touch each other's
/// files. The ingestor holds no mutable state and can be shared freely.
#[derive(Clone, Debug)]
pub struct ArchiveIngestor {
    content: ContentStore,
    config: IngestConfig,
    gate: ContentTypeGate,
}

impl ArchiveIngestor {
    pub fn new(content: ContentStore, config: IngestConfig) -> Self {
        let gate = ContentTypeGate::new(&config.extra_extensions);
        Self {
            content,
            config,
            gate,
        }
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Stage, validate and extract one uploaded archive.
    ///
    /// The staged copy of the upload is removed on every exit path. The
    /// first unsafe or disallowed entry aborts the whole upload; nothing is
    /// quarantined or partially accepted.
    pub fn ingest<R: Read>(&self, upload: R) -> IngestResult<IngestReceipt> {
        let staged = self.stage(upload)?;
        let mut archive = ZipArchive::new(staged.as_file())
            .map_err(|e| IngestError::InvalidArchive(e.to_string()))?;

        let bundle = self.content.create_bundle(BundleId::new())?;
        match self.extract(&mut archive, &bundle) {
            Ok(stats) => {
                info!(
                    bundle = %bundle.id(),
                    files = stats.files,
                    directories = stats.directories,
                    bytes = stats.bytes,
                    "bundle ingested"
                );
                Ok(IngestReceipt {
                    bundle_id: bundle.id(),
                    root: bundle.root().to_path_buf(),
                    playback_path: playback_path(&bundle.id()),
                    files: stats.files,
                    directories: stats.directories,
                    bytes: stats.bytes,
                })
            }
            Err(e) => {
                warn!(bundle = %bundle.id(), error = %e, "ingestion aborted");
                if self.config.discard_failed {
                    if let Err(rm) = self.content.remove_bundle(&bundle.id()) {
                        warn!(bundle = %bundle.id(), error = %rm, "failed to discard partial bundle");
                    }
                }
                Err(e)
            }
        }
    }

    /// Copy the upload into a temporary file, enforcing the size limit.
    fn stage<R: Read>(&self, mut upload: R) -> IngestResult<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("bundle-upload-").suffix(".zip");
        let mut staged = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let limit = self.config.max_archive_bytes;
        let copied = io::copy(
            &mut (&mut upload).take(limit.saturating_add(1)),
            staged.as_file_mut(),
        )?;
        if copied > limit {
            return Err(IngestError::TooLarge { limit });
        }
        staged.as_file_mut().seek(SeekFrom::Start(0))?;
        debug!(bytes = copied, "upload staged");
        Ok(staged)
    }

    fn extract<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        bundle: &Bundle,
    ) -> IngestResult<ExtractStats> {
        let limit = self.config.max_extracted_bytes;
        let mut stats = ExtractStats::default();

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| IngestError::InvalidArchive(e.to_string()))?;
            let name = entry.name().to_string();

            if is_ignorable(&name, &self.config.ignorable_prefixes) {
                debug!(entry = %name, "skipping metadata entry");
                continue;
            }

            let target = validate(&name, bundle.root())
                .ok_or_else(|| IngestError::PathTraversal { entry: name.clone() })?;
            let mode = entry.unix_mode();
            if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
                return Err(IngestError::PathTraversal { entry: name });
            }

            let is_dir = entry.is_dir();
            if !self.gate.is_allowed(&name, is_dir) {
                return Err(IngestError::DisallowedType { entry: name });
            }

            let dest = target.absolute();
            if is_dir {
                create_dirs(dest, &name)?;
                apply_mode(dest, mode, true)?;
                stats.directories += 1;
                continue;
            }

            if let Some(parent) = dest.parent() {
                create_dirs(parent, &name)?;
            }
            // Bundle directories are fresh; an existing file means the
            // archive names the same path twice.
            let mut out = match OpenOptions::new().write(true).create_new(true).open(dest) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(IngestError::InvalidArchive(format!("duplicate entry: {name}")))
                }
                Err(e) => return Err(e.into()),
            };

            let remaining = limit.saturating_sub(stats.bytes);
            let copied = io::copy(&mut (&mut entry).take(remaining.saturating_add(1)), &mut out)
                .map_err(|e| match e.kind() {
                    ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                        IngestError::InvalidArchive(format!("corrupt entry {name}: {e}"))
                    }
                    _ => IngestError::Io(e),
                })?;
            stats.bytes += copied;
            if stats.bytes > limit {
                return Err(IngestError::TooLarge { limit });
            }
            apply_mode(dest, mode, false)?;
            stats.files += 1;
        }
        Ok(stats)
    }
}

fn create_dirs(path: &Path, entry: &str) -> IngestResult<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(IngestError::InvalidArchive(
            format!("entry conflicts with an earlier file: {entry}"),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Carry the archive's permission bits over, minus anything that would
/// make served content executable or writable by others.
#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>, is_dir: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(mode) = mode else {
        return Ok(());
    };
    let mode = if is_dir {
        (mode & 0o755) | 0o700
    } else {
        (mode & 0o644) | 0o600
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>, _is_dir: bool) -> io::Result<()> {
    Ok(())
}
