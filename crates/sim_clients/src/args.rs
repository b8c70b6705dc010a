use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const EXAMPLE: &str = "\
Example:
To create 10 clients with names \"device0\", \"device1\", ..., \"device9\" sending a random message every 0.5 seconds:

   sim-clients -c 10 -n device -i 0.5
";

/// A program to create multiple MQTT clients sending random data.
#[derive(Parser, Debug, Clone)]
#[command(name = "sim-clients", version, after_help = EXAMPLE)]
pub struct SimArgs {
    /// Number of MQTT clients to be created
    #[arg(short = 'c', value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..))]
    pub clients_num: u32,

    /// Client ID root; client i is named "<root>i"
    #[arg(short = 'n', value_name = "ROOT_NAME")]
    pub clients_root_name: String,

    /// Interval in seconds between messages from each client, e.g. 0.5
    #[arg(short = 'i', value_name = "SECONDS", value_parser = parse_interval)]
    pub interval: Duration,

    /// IP address of the MQTT broker
    #[arg(long = "broker-ip", default_value = "127.0.0.1")]
    pub broker_ip: String,

    /// Port of the MQTT broker
    #[arg(long = "broker-port", default_value_t = 1883)]
    pub broker_port: u16,

    /// CA certificate used to verify the broker
    #[arg(long = "ca-cert", default_value = "/app/ca.crt")]
    pub ca_cert: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("interval must be greater than zero, got {}", value));
    }

    Ok(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_required_args_with_defaults() {
        let args = SimArgs::try_parse_from(["sim-clients", "-c", "3", "-n", "dev", "-i", "1"]).unwrap();

        assert_eq!(args.clients_num, 3);
        assert_eq!(args.clients_root_name, "dev");
        assert_eq!(args.interval, Duration::from_secs(1));
        assert_eq!(args.broker_ip, "127.0.0.1");
        assert_eq!(args.broker_port, 1883);
        assert_eq!(args.ca_cert, PathBuf::from("/app/ca.crt"));
    }

    #[test]
    fn test_parse_fractional_interval_and_broker() {
        let args = SimArgs::try_parse_from([
            "sim-clients",
            "-c",
            "10",
            "-n",
            "device",
            "-i",
            "0.5",
            "--broker-ip",
            "10.0.0.5",
            "--broker-port",
            "8884",
        ])
        .unwrap();

        assert_eq!(args.interval, Duration::from_millis(500));
        assert_eq!(args.broker_ip, "10.0.0.5");
        assert_eq!(args.broker_port, 8884);
    }

    #[test]
    fn test_missing_required_args_is_error() {
        assert!(SimArgs::try_parse_from(["sim-clients", "-c", "3", "-n", "dev"]).is_err());
        assert!(SimArgs::try_parse_from(["sim-clients", "-n", "dev", "-i", "1"]).is_err());
        assert!(SimArgs::try_parse_from(["sim-clients", "-c", "3", "-i", "1"]).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(SimArgs::try_parse_from(["sim-clients", "-c", "0", "-n", "dev", "-i", "1"]).is_err());
        assert!(SimArgs::try_parse_from(["sim-clients", "-c", "3", "-n", "dev", "-i", "0"]).is_err());
        assert!(SimArgs::try_parse_from(["sim-clients", "-c", "3", "-n", "dev", "-i", "-1"]).is_err());
        assert!(SimArgs::try_parse_from(["sim-clients", "-c", "3", "-n", "dev", "-i", "fast"]).is_err());
    }
}
