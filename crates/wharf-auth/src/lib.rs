use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderMap, StatusCode};

pub mod no_backend;

pub mod yes_backend;

mod error;

pub use error::*;

/// Authorization decisions for the chart repository.
///
/// Pushing a chart is a write, fetching the index or an archive is a read,
/// and removing charts is a delete; each is authorized separately so a
/// backend can hand out asymmetric permissions.
#[async_trait]
pub trait AuthProvider {
    type Config;

    async fn healthcheck(&self) -> anyhow::Result<()>;

    /// Verify that a user may upload the given chart.
    async fn auth_push(&self, token: &str, chart_name: &str) -> AuthResult<()>;

    /// Verify that a user may download a stored archive.
    async fn auth_download(&self, token: &str, filename: &str) -> AuthResult<()> {
        let _ = (token, filename);
        Err(AuthError::Unimplemented)
    }

    /// Verify that a user may fetch the repository index.
    async fn auth_index_fetch(&self, token: &str) -> AuthResult<()> {
        let _ = token;
        Err(AuthError::Unimplemented)
    }

    /// Verify that a user may delete charts from the repository.
    async fn auth_delete(&self, token: &str, chart_name: &str) -> AuthResult<()>;

    fn token_from_headers<'h>(
        &self,
        headers: &'h HeaderMap,
    ) -> Result<Option<&'h str>, StatusCode> {
        default_token_from_headers(headers)
    }
}

pub(crate) fn default_token_from_headers(headers: &HeaderMap) -> Result<Option<&str>, StatusCode> {
    match headers.get(AUTHORIZATION) {
        Some(auth) => auth.to_str().map_err(|_| StatusCode::BAD_REQUEST).map(Some),
        None => Ok(None),
    }
}
