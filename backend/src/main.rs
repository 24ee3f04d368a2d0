//! Foodgram - Main Entry Point

use clap::Parser;

use foodgram_backend::{
    cli::{startup, Cli},
    config::Config,
    telemetry,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("foodgram-backend: {}", e);
            std::process::exit(2);
        }
    };

    let otel_guard =
        telemetry::init_tracing(config.otel_endpoint.as_deref(), "foodgram-backend", config.debug);

    let command = cli.command();
    tracing::info!(?command, "Starting Foodgram backend");

    if let Err(e) = startup::run(command, config).await {
        tracing::error!(error = %e, "Foodgram backend failed");
        drop(otel_guard);
        std::process::exit(1);
    }
}
