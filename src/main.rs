use tracing::error;

use kestrel::server::{self, ServerConfig, ServerContext};

/// Parses the command line, builds the shared server context and runs the
/// accept loop until the process is terminated.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::from_args(std::env::args()) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid arguments: {}", e);
            std::process::exit(1);
        }
    };

    let context = ServerContext::new(config);
    server::run(context).await;
}
