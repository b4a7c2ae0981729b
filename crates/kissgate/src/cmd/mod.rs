use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use kissgate_transport::RadioAddr;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod monitor;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway: bridge a TNC port to chat clients.
    Serve(ServeArgs),
    /// Print frames received from a TNC.
    Monitor(MonitorArgs),
    /// Transmit a single data frame.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Send(args) => send::run(args),
        Command::Version(args) => version::run(args),
    }
}

fn parse_port(input: &str) -> Result<u8, String> {
    match input.parse::<u8>() {
        Ok(port) if port < kissgate_frame::PORT_COUNT => Ok(port),
        _ => Err(format!("port must be 0-{}", kissgate_frame::PORT_COUNT - 1)),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// TNC address: `host:port`, `tcp:host:port`, `unix:/path` or a device path.
    #[arg(long, env = "KISSGATE_TNC", default_value = "127.0.0.1:8001")]
    pub tnc: RadioAddr,
    /// TNC port carrying chat traffic.
    #[arg(long, env = "KISSGATE_TNC_PORT", default_value = "0", value_parser = parse_port)]
    pub tnc_port: u8,
    /// Address to accept chat clients on.
    #[arg(long, env = "KISSGATE_LISTEN", default_value = "0.0.0.0:6667")]
    pub listen: String,
    /// Server name used in replies.
    #[arg(long, env = "KISSGATE_NAME", default_value = "kissgate")]
    pub name: String,
    /// State file loaded at startup and saved periodically.
    #[arg(long, env = "KISSGATE_STATE", default_value = "serverState.json")]
    pub state: PathBuf,
    /// Neither load nor save state.
    #[arg(long)]
    pub no_persist: bool,
    /// Start empty when the state file cannot be read.
    #[arg(long)]
    pub tolerate_load_errors: bool,
    /// Do not pull local users into channels radio stations talk in.
    #[arg(long)]
    pub no_auto_join: bool,
    /// Interval between state saves (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub snapshot_interval: String,
    /// Interval between keepalive pings to clients.
    #[arg(long, default_value = "30s")]
    pub ping_interval: String,
    /// Message of the day sent after registration.
    #[arg(long, env = "KISSGATE_MOTD")]
    pub motd: Option<String>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// TNC address.
    #[arg(long, env = "KISSGATE_TNC", default_value = "127.0.0.1:8001")]
    pub tnc: RadioAddr,
    /// Only print frames for this port.
    #[arg(long, value_parser = parse_port)]
    pub port: Option<u8>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// TNC address.
    #[arg(long, env = "KISSGATE_TNC", default_value = "127.0.0.1:8001")]
    pub tnc: RadioAddr,
    /// Port to transmit on.
    #[arg(long, default_value = "0", value_parser = parse_port)]
    pub port: u8,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `150ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn install_ctrlc_handler(handler: impl FnMut() + Send + 'static) -> CliResult<()> {
    ctrlc::set_handler(handler)
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
        assert_eq!(parse_duration("5m").unwrap_err().code, USAGE);
    }

    #[test]
    fn port_range() {
        assert_eq!(parse_port("7"), Ok(7));
        assert!(parse_port("8").is_err());
        assert!(parse_port("-1").is_err());
    }
}
