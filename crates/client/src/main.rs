use clap::Parser;
use skylink_client::config::Cli;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = match cli.log.as_deref() {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.resolve()?;
    tracing::info!(server = %config.server, seed = config.seed, "skylink client starting");

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(skylink_client::read_controls(tokio::io::stdin(), tx));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    skylink_client::run(config, rx, shutdown).await?;
    Ok(())
}
