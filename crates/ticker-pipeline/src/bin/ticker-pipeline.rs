use clap::Parser;
use std::time::Duration;
use ticker_pipeline::cli::Cli;
use ticker_pipeline::config::PipelineConfig;
use ticker_pipeline::Orchestrator;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let Err(message) = cli.validate_ring_bits() {
        eprintln!("ticker-pipeline: {message}");
        return std::process::ExitCode::FAILURE;
    }

    let config = PipelineConfig {
        websocket_url: cli.url,
        product_id: cli.product,
        output_path: cli.output,
        ema_interval: chrono::Duration::seconds(cli.ema_interval_secs as i64),
        shutdown_timeout: Duration::from_secs(cli.shutdown_timeout_secs),
    };

    match Orchestrator::new(config).run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ticker-pipeline: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}
