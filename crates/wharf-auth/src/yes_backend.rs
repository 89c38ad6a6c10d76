//! A backend that says "yes" to every request for authorization.
//!
//! This is exactly as insecure as it sounds, and is meant primarily for
//! testing and for repositories fronted by their own access control.

use crate::{AuthProvider, AuthResult};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};

/// In the config specify `auth_allow_full_access_without_any_checks: true`
/// to give full access to the repository, including chart pushes and
/// deletes, to anyone who can connect to it.
pub struct YesAuthProvider(());

impl YesAuthProvider {
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(yes_config: Config) -> AuthResult<Self> {
        if !yes_config.auth_allow_full_access_without_any_checks {
            return Err(anyhow::anyhow!("enabled 'yes' auth without explicit opt-in").into());
        }
        Ok(Self(()))
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct Config {
    pub auth_allow_full_access_without_any_checks: bool,
}

#[async_trait]
impl AuthProvider for YesAuthProvider {
    type Config = Config;

    async fn healthcheck(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn auth_push(&self, _token: &str, _chart_name: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn auth_download(&self, _token: &str, _filename: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn auth_index_fetch(&self, _token: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn auth_delete(&self, _token: &str, _chart_name: &str) -> AuthResult<()> {
        Ok(())
    }

    fn token_from_headers<'h>(
        &self,
        _headers: &'h HeaderMap,
    ) -> Result<Option<&'h str>, StatusCode> {
        // anonymous access is fine here
        Ok(Some(""))
    }
}
