use crate::ServiceState;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use wharf_api_types::index::IndexError;
use wharf_api_types::storage::{BlobStorageProvider, Metadata};
use wharf_auth::AuthProvider;
use wharf_index::archive::ChartArchive;

#[derive(Deserialize)]
pub struct PushQuery {
    /// `updateIndex=false` stores the archive without touching `index.yaml`.
    #[serde(rename = "updateIndex")]
    update_index: Option<String>,
}

/// Accept an archived chart, save it into storage and reindex `index.yaml`.
///
/// Responds `200` with an empty body whether or not the index was updated.
/// A blob stored right before a failed index rewrite stays in place without
/// an index entry; pushing the same archive again re-indexes it.
pub async fn push_chart<S, A>(
    headers: HeaderMap,
    Query(query): Query<PushQuery>,
    State(state): State<Arc<ServiceState<S, A>>>,
    body: Bytes,
) -> axum::response::Result<StatusCode>
where
    S: BlobStorageProvider + Send + Sync,
    A: AuthProvider + Sync,
{
    let archive = ChartArchive::new(body)?;

    if state.config.auth_required {
        let token = state
            .auth
            .token_from_headers(&headers)?
            .ok_or((StatusCode::UNAUTHORIZED, "Auth token missing"))?;
        state.auth.auth_push(token, archive.chart_name()).await?;
    }

    let filename = archive.name();
    let meta = Metadata {
        content_type: Some("application/gzip"),
        content_length: Some(archive.bytes().len()),
        sha256: Some(archive.digest_bytes()),
        ..Metadata::default()
    };
    if let Err(e) = state
        .storage
        .put_file(&filename, archive.bytes().clone(), meta)
        .await
    {
        counter!("wharf_push_errors_total", "stage" => "store").increment(1);
        return Err(e.into());
    }

    if query.update_index.as_deref().map_or(true, |v| v == "true") {
        if let Err(e) = state.repo.add(std::slice::from_ref(&filename)).await {
            let error_label = match &e {
                IndexError::AlreadyPresent(_) => "conflict",
                IndexError::MalformedArchive(_) => "malformed",
                IndexError::IndexMissing | IndexError::NotFound => "not_found",
                IndexError::ServiceError(_) => "service_error",
            };

            counter!("wharf_push_errors_total", "stage" => "index", "error" => error_label)
                .increment(1);

            return Err(e.into());
        }
    }

    Ok(StatusCode::OK)
}
