use axum::body::Body;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::{Method, Request as HttpRequest, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::Router;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio::try_join;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::classify::StatusInRangeAsFailures;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use wharf_api_types::storage::BlobStorageProvider;
use wharf_auth::AuthProvider;
use wharf_index::repo::ChartRepo;

pub mod delete_chart;

pub mod download;

pub mod push;

#[derive(Clone, Deserialize)]
pub struct ServiceConfig {
    pub address: SocketAddr,
    pub metrics_address: SocketAddr,

    /// Uploads larger than this are rejected before parsing.
    #[serde(default = "default_chart_size_limit")]
    pub chart_size_limit: usize,

    /// Require an `Authorization` header on every chart operation.
    #[serde(default)]
    pub auth_required: bool,
}

pub struct ServiceState<S, A> {
    pub config: ServiceConfig,
    pub storage: Arc<S>,
    pub repo: ChartRepo<S>,
    pub auth: A,
}

impl<S, A> ServiceState<S, A> {
    pub fn new(config: ServiceConfig, storage: Arc<S>, repo: ChartRepo<S>, auth: A) -> Self {
        Self {
            config,
            storage,
            repo,
            auth,
        }
    }
}

pub fn router<S, A>(
    config: ServiceConfig,
    storage: Arc<S>,
    repo: ChartRepo<S>,
    auth: A,
) -> Router
where
    S: BlobStorageProvider + Send + Sync + 'static,
    A: AuthProvider + Send + Sync + 'static,
{
    let chart_size_limit = config.chart_size_limit;
    let state = Arc::new(ServiceState::new(config, storage, repo, auth));

    Router::new()
        .route(
            "/",
            put(push::push_chart)
                .post(push::push_chart)
                .delete(handle_malformed_delete),
        )
        .route("/index.yaml", get(download::download_index))
        .route("/:filename", get(download::download_chart))
        .route("/charts/:name", delete(delete_chart::delete_by_name))
        .route(
            "/charts/:name/:version",
            delete(delete_chart::delete_by_name_and_version),
        )
        .route("/healthcheck", get(healthcheck))
        .with_state(state)
        .fallback(handle_global_fallback)
        .layer(DefaultBodyLimit::max(chart_size_limit))
        .layer(CatchPanicLayer::custom(|_| {
            counter!("panics_total").increment(1);

            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }))
        .layer(
            TraceLayer::new(StatusInRangeAsFailures::new(400..=599).into_make_classifier())
                .make_span_with(|request: &HttpRequest<Body>| {
                    let method = request.method();
                    let uri = request.uri();

                    tracing::info_span!("http-request", ?method, ?uri)
                })
                .on_failure(DefaultOnFailure::new()),
        )
        .layer(from_fn(metrics_layer))
}

async fn metrics_layer(request: Request, next: Next) -> Response {
    let timer = Instant::now();

    let path = if let Some(path) = request.extensions().get::<MatchedPath>() {
        path.as_str().to_string()
    } else {
        request.uri().path().to_string()
    };

    let response = next.run(request).await;

    let elapsed = timer.elapsed();

    let code = response.status().as_u16().to_string();

    histogram!("request_duration_seconds", "code" => code, "endpoint" => path).record(elapsed);

    response
}

async fn healthcheck<S, A>(
    State(state): State<Arc<ServiceState<S, A>>>,
) -> axum::response::Result<String>
where
    S: BlobStorageProvider + Send + Sync,
    A: AuthProvider + Sync,
{
    let check_time = Duration::from_secs(4);
    let label = |label, res: Result<Result<(), anyhow::Error>, _>| match res {
        // healthcheck is unauthenticated and shouldn't leak internals via errors
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            for e in e.chain() {
                tracing::error!("{label} healthcheck: {e}");
            }
            Err(format!("{label} failed"))
        }
        Err(_) => Err(format!("{label} timed out")),
    };

    try_join! {
        async { label("auth", timeout(check_time, state.auth.healthcheck()).await) },
        async { label("storage", timeout(check_time, state.storage.healthcheck()).await) },
    }
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok("OK".into())
}

async fn handle_malformed_delete() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, "Wharf: malformed delete path")
}

pub async fn handle_global_fallback(method: Method) -> Response {
    if method == Method::DELETE {
        handle_malformed_delete().await.into_response()
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

#[inline(always)]
fn default_chart_size_limit() -> usize {
    // generous: chart archives are templates and metadata, not images
    50 * 1024 * 1024
}
