use crate::args::SimArgs;
use crate::client::{run_simulated_client, SimulatedClientConfig};
use common::mqtt::MqttConnectionConfig;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Client IDs `<root>0` .. `<root>(count - 1)`
pub fn client_ids(root_name: &str, count: u32) -> Vec<String> {
    (0..count).map(|i| format!("{}{}", root_name, i)).collect()
}

/// A fleet of independent simulated devices
pub struct Simulator {
    clients: Vec<SimulatedClientConfig>,
}

impl Simulator {
    pub fn from_args(args: &SimArgs) -> Self {
        let clients = client_ids(&args.clients_root_name, args.clients_num)
            .into_iter()
            .map(|client_id| SimulatedClientConfig {
                connection: MqttConnectionConfig::new(client_id, &args.broker_ip, args.broker_port)
                    .with_keep_alive_secs(60)
                    .with_ca_cert(&args.ca_cert),
                interval: args.interval,
            })
            .collect();

        Self { clients }
    }

    pub fn clients(&self) -> &[SimulatedClientConfig] {
        &self.clients
    }

    /// Run every client on its own task until `ctx` is cancelled.
    ///
    /// A client that cannot start (e.g. unreadable CA file) is logged and the
    /// rest keep running.
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(clients = self.clients.len(), "starting simulated clients");
        info!("Press CTRL+C to stop...");

        let mut join_set = JoinSet::new();
        for config in self.clients {
            join_set.spawn(run_simulated_client(ctx.clone(), config));
        }

        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %format!("{:#}", e), "simulated client failed"),
                Err(e) => error!(error = %e, "simulated client panicked"),
            }
        }

        info!("Terminated by the user.");
        Ok(())
    }
}
