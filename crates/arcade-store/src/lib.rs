//! Storage for arcade.
//!
//! Two stores meet here:
//!
//! - the **remote blob store**, a flat key-value namespace reached through
//!   the [`BlobStore`] trait (put / get / paginated list / delete);
//! - the **content store**, the local directory tree the HTTP layer serves
//!   from, with one subdirectory per bundle ([`ContentStore`]).
//!
//! # Blob Store Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`ObjectStoreBlobStore`] -- adapter over the `object_store` crate: S3
//!   and S3-compatible buckets (R2, MinIO) or a local directory
//!
//! # Design Rules
//!
//! 1. Keys are opaque, `/`-separated strings; backends never interpret them
//!    beyond rejecting ones that cannot be stored safely.
//! 2. Listing is paginated and ordered by key; callers follow continuation
//!    tokens until exhausted.
//! 3. `put` overwrites. Writing the same bytes twice is a no-op at the
//!    semantic level.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod content;
pub mod error;
pub mod memory;
pub mod remote;
pub mod traits;

pub use content::ContentStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlobStore;
pub use remote::{ObjectStoreBlobStore, S3Settings};
pub use traits::{BlobStore, ListPage, DEFAULT_PAGE_SIZE};
