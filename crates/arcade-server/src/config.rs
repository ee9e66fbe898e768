use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arcade_ingest::IngestConfig;
use arcade_store::{BlobStore, InMemoryBlobStore, ObjectStoreBlobStore, S3Settings};
use arcade_sync::SyncConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Complete service configuration, one section per component.
///
/// Every section has defaults, so an empty file (or no file) is valid.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeConfig {
    pub server: ServerSection,
    pub ingest: IngestConfig,
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: SocketAddr,
    /// Local content store; one subdirectory per bundle.
    pub content_root: PathBuf,
    /// Largest accepted request body.
    pub max_upload_bytes: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            content_root: PathBuf::from("./games"),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Which blob store backs the remote side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum RemoteConfig {
    /// Process-local store; nothing survives a restart.
    Memory,
    /// A directory, typically a volume shared by every instance.
    Filesystem { root: PathBuf },
    /// An S3-compatible bucket (AWS S3, Cloudflare R2, MinIO).
    S3(S3Remote),
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from("./remote"),
        }
    }
}

impl RemoteConfig {
    pub fn build(&self) -> ServerResult<Arc<dyn BlobStore>> {
        let store: Arc<dyn BlobStore> = match self {
            Self::Memory => Arc::new(InMemoryBlobStore::new()),
            Self::Filesystem { root } => Arc::new(ObjectStoreBlobStore::local(root)?),
            Self::S3(s3) => Arc::new(ObjectStoreBlobStore::s3(&s3.settings())?),
        };
        Ok(store)
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Remote {
    pub bucket: String,
    pub endpoint: Option<String>,
    /// Defaults to `auto`, which is what R2 expects.
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
}

impl S3Remote {
    fn settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.bucket.clone(),
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            allow_http: self.allow_http,
        }
    }
}

impl std::fmt::Debug for S3Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.settings(), f)
    }
}

/// Upload and admin credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token required by the removal endpoint. Removal is refused when unset.
    pub admin_token: Option<String>,
    /// Bearer tokens accepted for uploads.
    pub tokens: Vec<TokenEntry>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    /// Who the token belongs to; used in logs.
    pub owner: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl std::fmt::Debug for TokenEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEntry")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .finish()
    }
}

impl ArcadeConfig {
    /// Read the TOML file at `path` (defaults when `None`), then apply
    /// `ARCADE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> ServerResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    ServerError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Apply overrides from `var`, normally the process environment.
    pub fn apply_env<F>(&mut self, var: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = var("ARCADE_BIND") {
            self.server.bind_addr = bind
                .parse()
                .map_err(|e| ServerError::Config(format!("ARCADE_BIND: {e}")))?;
        }
        if let Some(root) = var("ARCADE_CONTENT_ROOT") {
            self.server.content_root = PathBuf::from(root);
        }
        if let Some(token) = var("ARCADE_ADMIN_TOKEN").filter(|t| !t.is_empty()) {
            self.auth.admin_token = Some(token);
        }
        if let Some(root) = var("ARCADE_REMOTE_ROOT") {
            self.remote = RemoteConfig::Filesystem {
                root: PathBuf::from(root),
            };
        }
        if let Some(bucket) = var("ARCADE_S3_BUCKET").filter(|b| !b.is_empty()) {
            match &mut self.remote {
                RemoteConfig::S3(s3) => s3.bucket = bucket,
                other => {
                    *other = RemoteConfig::S3(S3Remote {
                        bucket,
                        ..S3Remote::default()
                    })
                }
            }
        }
        if let RemoteConfig::S3(s3) = &mut self.remote {
            if let Some(endpoint) = var("ARCADE_S3_ENDPOINT") {
                s3.endpoint = Some(endpoint);
            }
            if let Some(region) = var("ARCADE_S3_REGION") {
                s3.region = Some(region);
            }
            if let Some(key) = var("ARCADE_S3_ACCESS_KEY_ID") {
                s3.access_key_id = Some(key);
            }
            if let Some(secret) = var("ARCADE_S3_SECRET_ACCESS_KEY") {
                s3.secret_access_key = Some(secret);
            }
        }
        if let Some(flag) = var("ARCADE_SYNC_DISABLED") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.sync.enabled = false,
                "0" | "false" | "no" | "" => {}
                other => {
                    return Err(ServerError::Config(format!(
                        "ARCADE_SYNC_DISABLED: expected a boolean, got {other:?}"
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let c = ArcadeConfig::default();
        assert_eq!(c.server.bind_addr, "0.0.0.0:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(c.server.content_root, PathBuf::from("./games"));
        assert_eq!(c.server.max_upload_bytes, 100 * 1024 * 1024);
        assert!(c.sync.enabled);
        assert!(c.auth.admin_token.is_none());
        assert!(matches!(c.remote, RemoteConfig::Filesystem { .. }));
    }

    #[test]
    fn parses_toml_sections() {
        let c = ArcadeConfig::from_toml(
            r#"
            [server]
            bind_addr = "127.0.0.1:8080"
            content_root = "/srv/games"

            [ingest]
            extra_extensions = [".wasm", ".pck"]

            [sync]
            prefix = "bundles"
            interval_secs = 60

            [remote]
            backend = "memory"

            [auth]
            admin_token = "admin"

            [[auth.tokens]]
            token = "t1"
            owner = "alice@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(c.server.bind_addr.port(), 8080);
        assert_eq!(c.server.content_root, PathBuf::from("/srv/games"));
        assert_eq!(c.ingest.extra_extensions.len(), 2);
        assert_eq!(c.ingest.max_archive_bytes, IngestConfig::default().max_archive_bytes);
        assert_eq!(c.sync.prefix, "bundles");
        assert_eq!(c.sync.interval_secs, 60);
        assert_eq!(c.remote, RemoteConfig::Memory);
        assert_eq!(c.auth.tokens[0].owner, "alice@example.com");
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            ArcadeConfig::from_toml("[server]\nbind_addr = 5"),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("ARCADE_BIND", "127.0.0.1:9000"),
            ("ARCADE_CONTENT_ROOT", "/data/games"),
            ("ARCADE_ADMIN_TOKEN", "secret"),
            ("ARCADE_REMOTE_ROOT", "/mnt/shared"),
            ("ARCADE_SYNC_DISABLED", "true"),
        ]
        .into_iter()
        .collect();
        let mut c = ArcadeConfig::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(c.server.bind_addr.port(), 9000);
        assert_eq!(c.server.content_root, PathBuf::from("/data/games"));
        assert_eq!(c.auth.admin_token.as_deref(), Some("secret"));
        assert_eq!(
            c.remote,
            RemoteConfig::Filesystem {
                root: PathBuf::from("/mnt/shared")
            }
        );
        assert!(!c.sync.enabled);
    }

    #[test]
    fn s3_section_parses_and_builds() {
        let c = ArcadeConfig::from_toml(
            r#"
            [remote]
            backend = "s3"
            bucket = "games"
            endpoint = "https://account.r2.cloudflarestorage.com"
            access_key_id = "key"
            secret_access_key = "secret"
            "#,
        )
        .unwrap();
        let RemoteConfig::S3(s3) = &c.remote else {
            panic!("expected s3 backend, got {:?}", c.remote);
        };
        assert_eq!(s3.bucket, "games");
        assert!(s3.region.is_none());
        assert!(!format!("{:?}", c.remote).contains("secret"));
        assert!(c.remote.build().is_ok());
    }

    #[test]
    fn s3_without_bucket_fails_to_build() {
        let remote = RemoteConfig::S3(S3Remote::default());
        assert!(matches!(remote.build(), Err(ServerError::Store(_))));
    }

    #[test]
    fn s3_environment_selects_bucket_backend() {
        let env: HashMap<&str, &str> = [
            ("ARCADE_S3_BUCKET", "arcade-games"),
            ("ARCADE_S3_ENDPOINT", "https://account.r2.cloudflarestorage.com"),
            ("ARCADE_S3_REGION", "auto"),
            ("ARCADE_S3_ACCESS_KEY_ID", "key"),
            ("ARCADE_S3_SECRET_ACCESS_KEY", "secret"),
        ]
        .into_iter()
        .collect();
        let mut c = ArcadeConfig::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(
            c.remote,
            RemoteConfig::S3(S3Remote {
                bucket: "arcade-games".into(),
                endpoint: Some("https://account.r2.cloudflarestorage.com".into()),
                region: Some("auto".into()),
                access_key_id: Some("key".into()),
                secret_access_key: Some("secret".into()),
                allow_http: false,
            })
        );
    }

    #[test]
    fn s3_credentials_ignored_for_other_backends() {
        let mut c = ArcadeConfig::default();
        c.apply_env(|k| (k == "ARCADE_S3_ENDPOINT").then(|| "http://minio:9000".to_string()))
            .unwrap();
        assert!(matches!(c.remote, RemoteConfig::Filesystem { .. }));
    }

    #[test]
    fn filesystem_backend_builds_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let remote = RemoteConfig::Filesystem {
            root: dir.path().join("remote"),
        };
        assert!(remote.build().is_ok());
        assert!(dir.path().join("remote").is_dir());
    }

    #[test]
    fn bad_environment_values_are_errors() {
        let mut c = ArcadeConfig::default();
        assert!(c.apply_env(|k| (k == "ARCADE_BIND").then(|| "nope".to_string())).is_err());
        assert!(c
            .apply_env(|k| (k == "ARCADE_SYNC_DISABLED").then(|| "maybe".to_string()))
            .is_err());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let auth = AuthConfig {
            admin_token: Some("admin-secret".into()),
            tokens: vec![TokenEntry {
                token: "upload-secret".into(),
                owner: "bob".into(),
            }],
        };
        let shown = format!("{auth:?}");
        assert!(!shown.contains("admin-secret"));
        assert!(!shown.contains("upload-secret"));
        assert!(shown.contains("bob"));
    }
}
