use clap::Parser;
use common::telemetry::{init_telemetry, TelemetryConfig};
use ptm_runner::Runner;
use sim_clients::{SimArgs, Simulator};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let args = SimArgs::parse();

    if let Err(e) = init_telemetry(&TelemetryConfig::for_service(
        "sim-clients",
        args.log_level.clone(),
    )) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    let simulator = Simulator::from_args(&args);

    let result = Runner::new()
        .with_app_process("simulator", move |ctx| simulator.run(ctx))
        .with_closer_timeout(Duration::from_secs(5))
        .run()
        .await;

    if let Err(e) = result {
        eprintln!("sim-clients exiting with error: {:#}", e);
        std::process::exit(1);
    }
}
