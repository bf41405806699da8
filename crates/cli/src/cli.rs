//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::HardwareMode;
use std::path::PathBuf;

/// EV telemetry server - sensor aggregation and command WebSocket server
#[derive(Parser, Debug)]
#[command(
    name = "ev-telemetry",
    author,
    version,
    about = "EV telemetry aggregation and command server",
    long_about = "Polls vehicle sensors (real GPIO or simulated), aggregates one \n\
                  telemetry snapshot per cycle and broadcasts it to every connected \n\
                  WebSocket client, while accepting settings and media commands."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EV_TELEMETRY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EV_TELEMETRY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve telemetry until Ctrl-C / SIGTERM
    Run(RunArgs),

    /// Validate a configuration file without serving
    Validate(ValidateArgs),

    /// Print the resolved configuration and hardware probe result
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "EV_TELEMETRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override listen host
    #[arg(long, env = "EV_TELEMETRY_HOST")]
    pub host: Option<String>,

    /// Override listen port
    #[arg(long, env = "EV_TELEMETRY_PORT")]
    pub port: Option<u16>,

    /// Override driver backend selection
    #[arg(long, value_enum, env = "EV_TELEMETRY_HARDWARE_MODE")]
    pub hardware_mode: Option<HardwareArg>,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, env = "EV_TELEMETRY_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Fixed simulation seed for reproducible runs
    #[arg(long, env = "EV_TELEMETRY_SEED")]
    pub seed: Option<u64>,

    /// Validate the resolved configuration and exit without serving
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "ev-telemetry.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Configuration file; built-in defaults when omitted
    #[arg(short, long, env = "EV_TELEMETRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Driver backend selection
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareArg {
    Auto,
    Hardware,
    Simulated,
}

impl From<HardwareArg> for HardwareMode {
    fn from(arg: HardwareArg) -> Self {
        match arg {
            HardwareArg::Auto => Self::Auto,
            HardwareArg::Hardware => Self::Hardware,
            HardwareArg::Simulated => Self::Simulated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::try_parse_from([
            "ev-telemetry",
            "run",
            "--port",
            "9100",
            "--hardware-mode",
            "simulated",
            "--seed",
            "42",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.hardware_mode, Some(HardwareArg::Simulated));
        assert_eq!(args.seed, Some(42));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["ev-telemetry", "-q", "-v", "info"]).is_err());
    }

    #[test]
    fn test_validate_defaults() {
        let cli = Cli::try_parse_from(["ev-telemetry", "validate", "--json"]).unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.config, PathBuf::from("ev-telemetry.toml"));
        assert!(args.json);
    }
}
