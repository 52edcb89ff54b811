//! # auth-adapters
//!
//! `CredentialProvider` implementations. The gateway names a caller role per
//! call; these decide which headers assert it.

use domains::{CallerRole, CredentialProvider};
use secrecy::{ExposeSecret, SecretString};

pub const USER_HEADER: &str = "x-user";

/// Sends a plain user label per role in the `x-user` header.
///
/// The server trusts whatever label the client sends, so this is only
/// suitable against the demo backend.
#[derive(Debug, Clone)]
pub struct RoleLabelCredentials {
    contributor: String,
    admin: String,
}

impl RoleLabelCredentials {
    pub fn new(contributor: impl Into<String>, admin: impl Into<String>) -> Self {
        Self {
            contributor: contributor.into(),
            admin: admin.into(),
        }
    }

    pub fn label(&self, role: CallerRole) -> &str {
        match role {
            CallerRole::Contributor => &self.contributor,
            CallerRole::Admin => &self.admin,
        }
    }
}

impl Default for RoleLabelCredentials {
    fn default() -> Self {
        Self::new("reliefAdmin", "netrunnerX")
    }
}

impl CredentialProvider for RoleLabelCredentials {
    fn headers_for(&self, role: CallerRole) -> Vec<(String, String)> {
        vec![(USER_HEADER.to_owned(), self.label(role).to_owned())]
    }
}

/// Sends a per-role bearer token in `Authorization`.
#[derive(Debug)]
pub struct BearerTokenCredentials {
    contributor: SecretString,
    admin: SecretString,
}

impl BearerTokenCredentials {
    pub fn new(contributor: SecretString, admin: SecretString) -> Self {
        Self { contributor, admin }
    }
}

impl CredentialProvider for BearerTokenCredentials {
    fn headers_for(&self, role: CallerRole) -> Vec<(String, String)> {
        let token = match role {
            CallerRole::Contributor => &self.contributor,
            CallerRole::Admin => &self.admin,
        };
        tracing::trace!(%role, "attaching bearer token");
        vec![(
            "Authorization".to_owned(),
            format!("Bearer {}", token.expose_secret()),
        )]
    }
}
