//! vesctl CLI - Command-line tool for driving VESC-class motor controllers.
//!
//! ## Features
//!
//! - Run a motor at a target RPM with a background refresh loop
//! - Send a one-shot stop (zero-current) command
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable support

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use vesctl::{
    MotorSession, NativePortEnumerator, NativePortFactory, PortEnumerator, RPM_MAX, SerialConfig,
};

mod config;
mod serial;

use config::Config;
use serial::{SerialOptions, ask_remember_port, select_serial_port};

/// Duty cycle used when neither `--duty` nor the config file provides one.
const DEFAULT_DUTY: u8 = 50;

/// vesctl - serial control for VESC-class motor controllers.
///
/// Environment variables:
///   VESCTL_PORT              - Default serial port
///   VESCTL_BAUD              - Default baud rate (default: 115200)
///   VESCTL_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "vesctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "VESCTL_PORT")]
    port: Option<String>,

    /// Baud rate for the serial link.
    #[arg(
        short,
        long,
        global = true,
        default_value = "115200",
        env = "VESCTL_BAUD"
    )]
    baud: u32,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "VESCTL_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the motor at a target RPM until interrupted.
    Run {
        /// Target speed in RPM (0-100000).
        #[arg(long)]
        rpm: Option<i32>,

        /// Duty cycle in percent (0-100).
        #[arg(long)]
        duty: Option<u8>,
    },

    /// Send a zero-current stop command to the controller.
    Stop,

    /// List available serial ports.
    Ports {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions (auto-detected if not specified).
        #[arg(value_enum)]
        shell: Option<Shell>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    if env::var("NO_COLOR").is_ok() || !console::Term::stderr().is_term() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    debug!(
        "vesctl v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Load configuration
    let mut config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Run { rpm, duty } => {
            cmd_run(&cli, &mut config, *rpm, *duty)?;
        },
        Commands::Stop => {
            cmd_stop(&cli, &mut config)?;
        },
        Commands::Ports { json } => {
            cmd_ports(*json)?;
        },
        Commands::Completions { shell } => {
            let shell = shell.or_else(detect_shell_type).unwrap_or_else(|| {
                eprintln!(
                    "{} specify a shell type, e.g.: vesctl completions bash",
                    style("Error:").red().bold()
                );
                std::process::exit(1);
            });
            cmd_completions(shell);
        },
    }

    Ok(())
}

/// Get serial port from CLI args, config, or interactive selection.
fn get_port(cli: &Cli, config: &mut Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        non_interactive: cli.non_interactive,
    };

    let from_discovery = cli.port.is_none() && config.connection.port.is_none();
    let selected = select_serial_port(&options, config)?;

    // Only offer to remember ports the user actually had to pick
    if from_discovery && !cli.non_interactive {
        ask_remember_port(&selected, config)?;
    }

    Ok(selected)
}

/// Build the serial configuration from CLI flags and config file values.
fn serial_config(cli: &Cli, config: &Config, port: String) -> SerialConfig {
    let mut sc = SerialConfig::new(port);
    let baud = config.connection.baud_rate.unwrap_or(cli.baud);
    // Explicit --baud always wins over the config file
    let baud = if cli.baud != 115_200 { cli.baud } else { baud };
    sc = sc.with_baud_rate(baud);
    if let Some(timeout_ms) = config.connection.timeout_ms {
        sc = sc.with_timeout(Duration::from_millis(timeout_ms));
    }
    sc
}

/// Run command implementation.
fn cmd_run(cli: &Cli, config: &mut Config, rpm: Option<i32>, duty: Option<u8>) -> Result<()> {
    let rpm = rpm
        .or(config.motor.rpm)
        .context("no RPM target; pass --rpm or set motor.rpm in the config file")?;
    let duty = duty.or(config.motor.duty_percent).unwrap_or(DEFAULT_DUTY);

    if !(0..=RPM_MAX).contains(&rpm) {
        anyhow::bail!("RPM target {rpm} out of range (0..={RPM_MAX})");
    }

    let port = get_port(cli, config)?;
    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {} baud",
            style("🔌").cyan(),
            style(&port).green(),
            cli.baud
        );
    }

    let mut session = MotorSession::new(NativePortFactory, serial_config(cli, config, port));

    session.connect().context("failed to open serial port")?;
    if !cli.quiet {
        eprintln!("{} Connected", style("✓").green());
    }

    session
        .start(rpm, duty)
        .context("failed to start the motor")?;
    if !cli.quiet {
        eprintln!(
            "{} Motor running at {} RPM ({duty}% duty), press Ctrl-C to stop",
            style("▶").green().bold(),
            style(rpm).cyan()
        );
    }

    // Block until Ctrl-C, then shut down cleanly
    let (tx, rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("failed to install the Ctrl-C handler")?;

    let _ = rx.recv();

    if !cli.quiet {
        eprintln!("\n{} Stopping motor", style("⏳").yellow());
    }
    session.stop().context("failed to stop the motor")?;
    session.disconnect()?;

    if !cli.quiet {
        eprintln!("{} Motor stopped", style("✓").green().bold());
    }

    Ok(())
}

/// Stop command implementation: one-shot zero-current command.
fn cmd_stop(cli: &Cli, config: &mut Config) -> Result<()> {
    let port = get_port(cli, config)?;
    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {} baud",
            style("🔌").cyan(),
            style(&port).green(),
            cli.baud
        );
    }

    let mut session = MotorSession::new(NativePortFactory, serial_config(cli, config, port));
    session.stop().context("failed to send the stop command")?;

    if !cli.quiet {
        eprintln!("{} Stop command sent", style("✓").green().bold());
    }

    Ok(())
}

/// Ports command implementation.
fn cmd_ports(json: bool) -> Result<()> {
    let ports = NativePortEnumerator::list_ports()?;

    if json {
        let entries: Vec<serde_json::Value> = ports
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "vid": p.vid,
                    "pid": p.pid,
                    "product": p.product,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &ports {
        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            vid_pid,
            product
        );
    }

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

/// Detect the user's current shell from environment.
fn detect_shell_type() -> Option<Shell> {
    if let Ok(shell_path) = env::var("SHELL") {
        let shell_name = std::path::Path::new(&shell_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");
        return match shell_name {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            "fish" => Some(Shell::Fish),
            "elvish" => Some(Shell::Elvish),
            "pwsh" | "powershell" => Some(Shell::PowerShell),
            _ => None,
        };
    }

    if cfg!(windows) && env::var("PSModulePath").is_ok() {
        return Some(Shell::PowerShell);
    }

    None
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    // ---- clap validation ----

    #[test]
    fn test_cli_command_is_valid() {
        // Verifies that all derive macros produce a valid clap Command
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from([
            "vesctl",
            "--port",
            "/dev/ttyACM0",
            "run",
            "--rpm",
            "10000",
            "--duty",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM0"));
        if let Commands::Run { rpm, duty } = cli.command {
            assert_eq!(rpm, Some(10_000));
            assert_eq!(duty, Some(50));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_run_without_targets() {
        // Targets may come from the config file, so flags are optional
        let cli = Cli::try_parse_from(["vesctl", "run"]).unwrap();
        if let Commands::Run { rpm, duty } = cli.command {
            assert!(rpm.is_none());
            assert!(duty.is_none());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_stop() {
        let cli = Cli::try_parse_from(["vesctl", "stop"]).unwrap();
        assert!(matches!(cli.command, Commands::Stop));
    }

    #[test]
    fn test_cli_parse_ports() {
        let cli = Cli::try_parse_from(["vesctl", "ports"]).unwrap();
        assert!(matches!(cli.command, Commands::Ports { json: false }));
    }

    #[test]
    fn test_cli_parse_ports_json() {
        let cli = Cli::try_parse_from(["vesctl", "ports", "--json"]).unwrap();
        if let Commands::Ports { json } = cli.command {
            assert!(json);
        } else {
            panic!("Expected Ports command");
        }
    }

    #[test]
    fn test_cli_parse_completions() {
        let cli = Cli::try_parse_from(["vesctl", "completions", "bash"]).unwrap();
        assert!(matches!(cli.command, Commands::Completions { .. }));
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["vesctl", "ports"]).unwrap();
        assert_eq!(cli.baud, 115_200);
        assert!(!cli.quiet);
        assert!(!cli.non_interactive);
        assert!(cli.port.is_none());
        assert!(cli.config_path.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "vesctl",
            "--port",
            "COM3",
            "--baud",
            "230400",
            "-vv",
            "--quiet",
            "--non-interactive",
            "--config",
            "/tmp/config.toml",
            "ports",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("COM3"));
        assert_eq!(cli.baud, 230_400);
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
        assert!(cli.non_interactive);
    }

    #[test]
    fn test_cli_missing_subcommand() {
        let result = Cli::try_parse_from(["vesctl"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_invalid_duty() {
        // Duty is u8; 256 does not fit
        let result = Cli::try_parse_from(["vesctl", "run", "--rpm", "100", "--duty", "256"]);
        assert!(result.is_err());
    }

    // ---- serial_config layering ----

    #[test]
    fn test_serial_config_explicit_baud_wins() {
        let cli = Cli::try_parse_from(["vesctl", "--baud", "230400", "stop"]).unwrap();
        let mut config = Config::default();
        config.connection.baud_rate = Some(57_600);

        let sc = serial_config(&cli, &config, "COM3".to_string());
        assert_eq!(sc.baud_rate, 230_400);
    }

    #[test]
    fn test_serial_config_falls_back_to_config_file() {
        let cli = Cli::try_parse_from(["vesctl", "stop"]).unwrap();
        let mut config = Config::default();
        config.connection.baud_rate = Some(57_600);
        config.connection.timeout_ms = Some(200);

        let sc = serial_config(&cli, &config, "COM3".to_string());
        assert_eq!(sc.baud_rate, 57_600);
        assert_eq!(sc.timeout, Duration::from_millis(200));
    }

    #[test]
    fn test_serial_config_defaults() {
        let cli = Cli::try_parse_from(["vesctl", "stop"]).unwrap();
        let sc = serial_config(&cli, &Config::default(), "/dev/ttyACM0".to_string());
        assert_eq!(sc.port_name, "/dev/ttyACM0");
        assert_eq!(sc.baud_rate, 115_200);
        assert_eq!(sc.timeout, Duration::from_millis(50));
    }
}
