use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = wharf::cli::WharfArgs::parse();

    wharf::run(args).await
}
