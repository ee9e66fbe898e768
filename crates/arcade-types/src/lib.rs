//! Foundation types for arcade.
//!
//! Every other arcade crate depends on `arcade-types`. The types here carry
//! no I/O; they name things and map between the local content tree and the
//! remote object store.
//!
//! # Key Types
//!
//! - [`BundleId`] -- time-ordered UUID v7 naming one uploaded bundle
//! - [`Bundle`] -- a bundle identifier paired with its root directory
//! - [`RemoteKey`] -- `<prefix>/<bundle-id>/<path>` key in the remote store

pub mod bundle;
pub mod error;
pub mod key;

pub use bundle::{playback_path, Bundle, BundleId};
pub use error::TypeError;
pub use key::RemoteKey;
