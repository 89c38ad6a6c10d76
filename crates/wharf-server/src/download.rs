use crate::ServiceState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use std::sync::Arc;
use wharf_api_types::index::INDEX_YAML;
use wharf_api_types::storage::{BlobStorageProvider, FileResponse};
use wharf_auth::AuthProvider;

/// Serve the repository catalogue. `404` until the first indexed push.
pub async fn download_index<S, A>(
    headers: HeaderMap,
    State(state): State<Arc<ServiceState<S, A>>>,
) -> axum::response::Result<Response>
where
    S: BlobStorageProvider + Send + Sync,
    A: AuthProvider + Sync,
{
    if state.config.auth_required {
        let token = state
            .auth
            .token_from_headers(&headers)?
            .ok_or(StatusCode::UNAUTHORIZED)?;
        state.auth.auth_index_fetch(token).await?;
    }

    let file = state.storage.pull_file(INDEX_YAML).await?;
    Ok(serve(file, "application/x-yaml"))
}

/// Serve a stored chart archive by its `{name}-{version}.tgz` key.
pub async fn download_chart<S, A>(
    headers: HeaderMap,
    State(state): State<Arc<ServiceState<S, A>>>,
    Path(filename): Path<String>,
) -> axum::response::Result<Response>
where
    S: BlobStorageProvider + Send + Sync,
    A: AuthProvider + Sync,
{
    if state.config.auth_required {
        let token = state
            .auth
            .token_from_headers(&headers)?
            .ok_or(StatusCode::UNAUTHORIZED)?;
        state.auth.auth_download(token, &filename).await?;
    }

    let file = state.storage.pull_file(&filename).await?;
    Ok(serve(file, "application/gzip"))
}

fn serve(file: FileResponse, content_type: &'static str) -> Response {
    let mut res = Response::new(file.data.into());
    res.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Some(last_mod) = file
        .last_modified
        .and_then(|d| d.to_rfc2822().try_into().ok())
    {
        res.headers_mut().insert(header::LAST_MODIFIED, last_mod);
    }
    res
}
