//! Synapse control-plane entry point.

use anyhow::Context;
use tracing::{error, info};

use control_runtime::{wiring, RuntimeConfig};
use synapse_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("telemetry init")?;

    let config = RuntimeConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let mut runtime = wiring::build(&config).context("wiring control plane")?;

    tokio::select! {
        result = runtime.gateway.serve() => {
            if let Err(e) = result {
                error!(error = %e, "Gateway exited with error");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }

    info!("Control plane stopped");
    Ok(())
}
