use clap::{Args, Parser, Subcommand};
use gcodelink::JogDirection;
use std::path::PathBuf;

/// Port name served by `--simulate`
pub const SIMULATED_PORT: &str = "sim0";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gcodelink",
    version,
    about = "Jog, stream and preview G-code on a serial CNC/laser controller"
)]
pub struct Cli {
    /// Config file (.toml or .json); defaults to the platform config dir
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the configured baud rate
    #[arg(long, global = true)]
    pub baud: Option<u32>,
    /// Talk to an in-memory controller that answers "ok" to every line
    #[arg(long, global = true, default_value_t = false)]
    pub simulate: bool,
    /// Log as JSON lines on stderr
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// List serial ports
    Ports,
    /// Parse a G-code file and summarise its toolpath
    Preview(PreviewOpts),
    /// Send one raw line and print the replies
    Send(SendOpts),
    /// Send a jog and print the replies
    Jog(JogOpts),
    /// Stream a G-code file line by line
    Stream(StreamOpts),
}

#[derive(Args, Debug, Clone)]
pub struct PortOpts {
    /// Serial device; falls back to the configured port
    #[arg(long)]
    pub port: Option<String>,
    /// How long to keep printing replies after the last write, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub wait_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct PreviewOpts {
    /// G-code file
    pub file: PathBuf,
    /// Print every waypoint, not just the summary
    #[arg(long, default_value_t = false)]
    pub waypoints: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SendOpts {
    #[command(flatten)]
    pub target: PortOpts,
    /// Line to send, e.g. "$H" or "G0 X10"
    pub text: String,
}

#[derive(Args, Debug, Clone)]
pub struct JogOpts {
    #[command(flatten)]
    pub target: PortOpts,
    /// left, right, up, down, return-to-zero, set-zero, or a code 1001-1006
    pub direction: JogDirection,
}

#[derive(Args, Debug, Clone)]
pub struct StreamOpts {
    #[command(flatten)]
    pub target: PortOpts,
    /// G-code file
    pub file: PathBuf,
    /// Override the configured delay between lines, in milliseconds
    #[arg(long)]
    pub pacing_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jog_direction_parses_names_and_codes() {
        let cli = Cli::try_parse_from(["gcodelink", "jog", "--port", "/dev/ttyUSB0", "up"]).unwrap();
        match cli.cmd {
            Cmd::Jog(opts) => {
                assert_eq!(opts.direction, JogDirection::Up);
                assert_eq!(opts.target.port.as_deref(), Some("/dev/ttyUSB0"));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["gcodelink", "jog", "1006"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Jog(JogOpts { direction: JogDirection::SetZero, .. })));

        assert!(Cli::try_parse_from(["gcodelink", "jog", "sideways"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gcodelink", "stream", "part.nc", "--simulate", "--baud", "250000", "--pacing-ms", "5",
        ])
        .unwrap();
        assert!(cli.simulate);
        assert_eq!(cli.baud, Some(250_000));
        match cli.cmd {
            Cmd::Stream(opts) => {
                assert_eq!(opts.file, PathBuf::from("part.nc"));
                assert_eq!(opts.pacing_ms, Some(5));
                assert_eq!(opts.target.wait_ms, 1000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
