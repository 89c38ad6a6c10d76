use anyhow::Context;
use std::fs::read_to_string;
use std::sync::Arc;
use tokio::net::TcpListener;

cfg_if::cfg_if! {
    if #[cfg(feature = "yes-auth-backend")] {
        use wharf_auth::yes_backend::YesAuthProvider as SelectedAuthProvider;
    } else {
        use wharf_auth::no_backend::NoAuthProvider as SelectedAuthProvider;
    }
}
use metrics_exporter_prometheus::PrometheusBuilder;
use wharf_index::repo::ChartRepo;
use wharf_storage::fs::FsStorageProvider;

pub mod cli;
mod config;

pub async fn run(args: cli::WharfArgs) -> anyhow::Result<()> {
    let config: config::Config<SelectedAuthProvider> = serde_yaml::from_str(
        &read_to_string(args.config)
            .context("Failed to read config file from disk, is it present?")?,
    )
    .context("Failed to deserialize config file, please make sure its in the right format")?;

    let config::Config {
        service,
        repo,
        store,
        auth_config,
    } = config;

    PrometheusBuilder::new()
        .with_http_listener(service.metrics_address)
        .set_buckets(&[
            100e-6, 500e-6, 1e-3, 5e-3, 1e-2, 5e-2, 1e-1, 2e-1, 3e-1, 4e-1, 5e-1, 6e-1, 7e-1, 8e-1,
            9e-1, 1.0, 5.0, 10.0,
        ])
        .context("Failed to set buckets for prometheus")?
        .install()
        .context("Failed to install prometheus exporter")?;

    let addr = service.address;

    let storage =
        Arc::new(FsStorageProvider::new(store.path).context("Failed to open the storage root")?);
    let chart_repo = ChartRepo::new(storage.clone(), repo.base_url);
    let auth_client =
        SelectedAuthProvider::new(auth_config).context("Failed to initialize auth client")?;

    let router = wharf_server::router(service, storage, chart_repo, auth_client);

    tracing::info!(
        ?addr,
        "Starting wharf instance with {} auth",
        std::any::type_name::<SelectedAuthProvider>()
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Wharf server exited with error")?;

    tracing::info!("Completed graceful shutdown");

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal;

        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    terminate.await;

    tracing::info!("SIGTERM received, beginning graceful shutdown");
}
