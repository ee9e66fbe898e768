//! HTTP surface for arcade.
//!
//! Uploads arrive as multipart forms carrying a zip archive, are ingested
//! into the local content store and queued for pushing to the remote blob
//! store. Bundles are then served as static sites under `/play/<id>/`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{Credentials, Identity, StaticTokenDirectory, TokenDirectory};
pub use config::{ArcadeConfig, AuthConfig, RemoteConfig, S3Remote, ServerSection, TokenEntry};
pub use error::{ServerError, ServerResult};
pub use server::{shutdown_signal, ArcadeServer};
pub use state::AppState;
