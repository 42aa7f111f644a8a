use greenlight_server::{config::ServerConfig, run::run, Result};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {e}");
    }

    let args = ServerConfig::load()?;
    run(args).await
}
