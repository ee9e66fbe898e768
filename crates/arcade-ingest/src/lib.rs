//! Untrusted archive ingestion for arcade.
//!
//! An uploaded zip is staged to a temporary file, opened, and every entry
//! is run through two gates before anything is written:
//!
//! 1. [`path_safety`] -- the entry must resolve strictly inside the new
//!    bundle directory (no `..` escapes, no absolute names, no symlinks).
//! 2. [`content_gate`] -- file entries must carry an allow-listed extension.
//!
//! A single failing entry aborts the whole upload. Surviving entries are
//! extracted into a freshly created bundle directory in the
//! [`ContentStore`](arcade_store::ContentStore).

pub mod config;
pub mod content_gate;
pub mod error;
pub mod ingestor;
pub mod path_safety;

pub use config::IngestConfig;
pub use content_gate::{ContentTypeGate, DEFAULT_ALLOWED_EXTENSIONS};
pub use error::{IngestError, IngestResult};
pub use ingestor::{ArchiveIngestor, IngestReceipt};
pub use path_safety::{is_ignorable, is_safe, validate, ValidatedPath};
