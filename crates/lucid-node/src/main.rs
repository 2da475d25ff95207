//! Lucid node binary.
//!
//! Exit codes: 0 on graceful shutdown, 2 on configuration validation
//! failure, 1 on runtime failure.

use std::process::ExitCode;

use tracing::{error, info};

use lucid_node::{Config, Container};
use lucid_telemetry::{init_telemetry, TelemetryConfig};

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };

    let _guard = match init_telemetry(&TelemetryConfig {
        log_filter: config.log_filter.clone(),
        json_logs: config.production,
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("telemetry error: {e}");
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "node failed");
            ExitCode::from(1)
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let container = Container::initialize(&config).await?;
    let handles = container.spawn_background_loops();
    info!("lucid node running");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    container.shutdown();

    for handle in handles {
        let _ = handle.await;
    }
    info!("lucid node stopped");
    Ok(())
}
