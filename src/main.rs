use std::process;

use tiendita_pos::Config;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if let Err(err) = start().await {
        error!("Error: {}", err);
        process::exit(1);
    }
}

async fn start() -> Result<(), tiendita_pos::Error> {
    let config = Config::load()?;
    tiendita_pos::run(config).await
}
