use crate::ServiceState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use metrics::counter;
use std::sync::Arc;
use wharf_api_types::index::IndexError;
use wharf_api_types::storage::BlobStorageProvider;
use wharf_auth::AuthProvider;
use wharf_index::repo::DeleteTarget;

/// Remove every version of a chart, and their archives. `404` when the
/// index is absent or the chart is not listed.
pub async fn delete_by_name<S, A>(
    headers: HeaderMap,
    State(state): State<Arc<ServiceState<S, A>>>,
    Path(name): Path<String>,
) -> axum::response::Result<StatusCode>
where
    S: BlobStorageProvider + Send + Sync,
    A: AuthProvider + Sync,
{
    authorize(&state, &headers, &name).await?;
    run_delete(&state, DeleteTarget::Chart(name)).await
}

/// Remove one version of a chart and its archive.
pub async fn delete_by_name_and_version<S, A>(
    headers: HeaderMap,
    State(state): State<Arc<ServiceState<S, A>>>,
    Path((name, version)): Path<(String, String)>,
) -> axum::response::Result<StatusCode>
where
    S: BlobStorageProvider + Send + Sync,
    A: AuthProvider + Sync,
{
    authorize(&state, &headers, &name).await?;
    run_delete(&state, DeleteTarget::Version { name, version }).await
}

async fn authorize<S, A>(
    state: &ServiceState<S, A>,
    headers: &HeaderMap,
    name: &str,
) -> axum::response::Result<()>
where
    A: AuthProvider + Sync,
{
    if state.config.auth_required {
        let token = state
            .auth
            .token_from_headers(headers)?
            .ok_or((StatusCode::UNAUTHORIZED, "Auth token missing"))?;
        state.auth.auth_delete(token, name).await?;
    }
    Ok(())
}

async fn run_delete<S, A>(
    state: &ServiceState<S, A>,
    target: DeleteTarget,
) -> axum::response::Result<StatusCode>
where
    S: BlobStorageProvider + Send + Sync,
{
    if let Err(e) = state.repo.delete(std::slice::from_ref(&target)).await {
        let error_label = match &e {
            IndexError::IndexMissing => "index_missing",
            IndexError::NotFound => "not_found",
            IndexError::AlreadyPresent(_) | IndexError::MalformedArchive(_) => "invalid",
            IndexError::ServiceError(_) => "service_error",
        };

        counter!("wharf_delete_errors_total", "error" => error_label).increment(1);

        return Err(e.into());
    }
    Ok(StatusCode::OK)
}
