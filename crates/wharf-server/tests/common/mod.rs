use axum::body::{to_bytes, Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::sync::Arc;
use tower::ServiceExt;
use wharf_auth::yes_backend::{Config as YesConfig, YesAuthProvider};
use wharf_index::repo::ChartRepo;
use wharf_server::{router, ServiceConfig};
use wharf_storage::memory::MemoryStorageProvider;

pub const BASE_URL: &str = "http://charts.local/";

pub fn service() -> (Arc<MemoryStorageProvider>, Router) {
    let _ = tracing_subscriber::fmt::fmt().with_test_writer().try_init();

    let config = ServiceConfig {
        address: "127.0.0.1:0".parse().unwrap(),
        metrics_address: "127.0.0.1:0".parse().unwrap(),
        chart_size_limit: 10 * 1024 * 1024,
        auth_required: false,
    };
    let storage = Arc::new(MemoryStorageProvider::new());
    let repo = ChartRepo::new(storage.clone(), BASE_URL.to_owned());
    let auth = YesAuthProvider::new(YesConfig {
        auth_allow_full_access_without_any_checks: true,
    })
    .unwrap();
    (storage.clone(), router(config, storage, repo, auth))
}

pub fn chart_tgz(name: &str, version: &str) -> Bytes {
    let manifest = format!(
        "apiVersion: v1\ndescription: A test chart\nname: {name}\nversion: {version}\n"
    );
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("{name}/Chart.yaml"),
            manifest.as_bytes(),
        )
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap().into()
}

pub async fn request(router: &Router, method: &str, uri: &str, body: Body) -> Response<Body> {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn push(router: &Router, name: &str, version: &str) {
    let response = request(
        router,
        "PUT",
        "/",
        Body::from(chart_tgz(name, version)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    to_bytes(response.into_body(), 100 * 1024 * 1024).await.unwrap()
}
