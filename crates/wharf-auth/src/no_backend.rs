//! Useless (but safe) placeholder for a backend
use crate::{AuthError, AuthProvider, AuthResult};
use async_trait::async_trait;

pub struct NoAuthProvider;

fn nope<T>() -> AuthResult<T> {
    Err(AuthError::Unimplemented)
}

impl NoAuthProvider {
    pub fn new(_no_config: ()) -> AuthResult<Self> {
        nope()
    }
}

/// Used as fallback to avoid compile error when no backend is configured
#[async_trait]
impl AuthProvider for NoAuthProvider {
    type Config = ();

    async fn healthcheck(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn auth_push(&self, _token: &str, _chart_name: &str) -> AuthResult<()> {
        nope()
    }

    async fn auth_download(&self, _token: &str, _filename: &str) -> AuthResult<()> {
        nope()
    }

    async fn auth_index_fetch(&self, _token: &str) -> AuthResult<()> {
        nope()
    }

    async fn auth_delete(&self, _token: &str, _chart_name: &str) -> AuthResult<()> {
        nope()
    }
}
