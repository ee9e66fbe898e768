use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};

use crate::config::TokenEntry;
use crate::error::{ServerError, ServerResult};

/// Who made a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            name: "admin".into(),
            is_admin: true,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Read the `Authorization` header. Both `Bearer <token>` and a bare
    /// token are accepted.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Self::Anonymous;
        };
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if token.is_empty() {
            Self::Anonymous
        } else {
            Self::Bearer(token.to_string())
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Bearer(token) => Some(token),
            Self::Anonymous => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Lookup of upload tokens, e.g. a user table in an external service.
#[async_trait]
pub trait TokenDirectory: Send + Sync {
    /// The uploader a token belongs to, or `None` for unknown tokens.
    async fn lookup(&self, token: &str) -> ServerResult<Option<Identity>>;
}

/// Token directory held in memory, filled from configuration.
#[derive(Default)]
pub struct StaticTokenDirectory {
    tokens: HashMap<String, String>,
}

impl StaticTokenDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[TokenEntry]) -> Self {
        let mut dir = Self::new();
        for entry in entries {
            dir.insert(entry.token.clone(), entry.owner.clone());
        }
        dir
    }

    pub fn with_token(mut self, token: impl Into<String>, owner: impl Into<String>) -> Self {
        self.insert(token, owner);
        self
    }

    pub fn insert(&mut self, token: impl Into<String>, owner: impl Into<String>) {
        self.tokens.insert(token.into(), owner.into());
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenDirectory for StaticTokenDirectory {
    async fn lookup(&self, token: &str) -> ServerResult<Option<Identity>> {
        Ok(self.tokens.get(token).map(Identity::user))
    }
}

/// Resolve upload credentials to an identity, or fail with 401.
pub async fn authenticate(directory: &dyn TokenDirectory, credentials: &Credentials) -> ServerResult<Identity> {
    let token = credentials
        .token()
        .ok_or_else(|| ServerError::Unauthorized("authorization header is missing".into()))?;
    directory
        .lookup(token)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("invalid or expired token".into()))
}

/// Check credentials against the configured admin token.
pub fn authorize_admin(admin_token: Option<&str>, credentials: &Credentials) -> ServerResult<Identity> {
    match (admin_token, credentials.token()) {
        (Some(expected), Some(given)) if constant_time_eq(expected.as_bytes(), given.as_bytes()) => {
            Ok(Identity::admin())
        }
        _ => Err(ServerError::Unauthorized("unauthorized".into())),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn credentials_from_headers() {
        assert_eq!(Credentials::from_headers(&HeaderMap::new()), Credentials::Anonymous);
        assert_eq!(
            Credentials::from_headers(&headers("Bearer abc")),
            Credentials::Bearer("abc".into())
        );
        assert_eq!(Credentials::from_headers(&headers("abc")), Credentials::Bearer("abc".into()));
        assert_eq!(Credentials::from_headers(&headers("Bearer ")), Credentials::Anonymous);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let shown = format!("{:?}", Credentials::Bearer("s3cret".into()));
        assert!(!shown.contains("s3cret"));
    }

    #[tokio::test]
    async fn static_directory_lookup() {
        let dir = StaticTokenDirectory::new().with_token("t1", "alice");
        let id = authenticate(&dir, &Credentials::Bearer("t1".into())).await.unwrap();
        assert_eq!(id, Identity::user("alice"));

        let unknown = authenticate(&dir, &Credentials::Bearer("t2".into())).await;
        assert!(matches!(unknown, Err(ServerError::Unauthorized(_))));
        let anonymous = authenticate(&dir, &Credentials::Anonymous).await;
        assert!(matches!(anonymous, Err(ServerError::Unauthorized(_))));
    }

    #[test]
    fn directory_from_config_entries() {
        let dir = StaticTokenDirectory::from_entries(&[TokenEntry {
            token: "t".into(),
            owner: "o".into(),
        }]);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn admin_authorization() {
        let good = Credentials::Bearer("admin".into());
        assert!(authorize_admin(Some("admin"), &good).unwrap().is_admin);
        assert!(authorize_admin(Some("admin"), &Credentials::Bearer("admi".into())).is_err());
        assert!(authorize_admin(Some("admin"), &Credentials::Anonymous).is_err());
        // Without a configured token nobody is admin.
        assert!(authorize_admin(None, &good).is_err());
    }
}
