//! Interactive serial port selection.
//!
//! Mirrors the behavior expected from embedded flashing tools:
//! - Auto-detection of known USB controller devices
//! - Interactive selection via dialoguer when several candidates exist
//! - Remembering the selected port in configuration
//! - Deterministic non-interactive mode for scripts and CI

use {
    crate::config::Config,
    anyhow::{Result, anyhow},
    console::style,
    dialoguer::{Confirm, Select, theme::ColorfulTheme},
    log::{debug, info},
    std::io::IsTerminal,
    vesctl::{NativePortEnumerator, PortEnumerator, PortInfo},
};

/// USB VID/PID pairs recognized as VESC-class controllers.
///
/// 0483:5740 is the STM32 virtual COM port used by stock VESC hardware.
const KNOWN_USB_DEVICES: &[(u16, u16)] = &[(0x0483, 0x5740)];

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Non-interactive mode (fail instead of prompting).
    pub non_interactive: bool,
}

/// Whether a detected port matches a known controller device.
fn is_known_device(port: &PortInfo) -> bool {
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => KNOWN_USB_DEVICES.contains(&(vid, pid)),
        _ => false,
    }
}

fn describe(port: &PortInfo) -> String {
    let vid_pid = match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => format!(" ({vid:04X}:{pid:04X})"),
        _ => String::new(),
    };
    let product = port
        .product
        .as_deref()
        .map(|p| format!(" - {p}"))
        .unwrap_or_default();
    format!("{}{vid_pid}{product}", port.name)
}

/// Select a serial port from CLI args, config, or discovery.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<String> {
    // If port explicitly specified, use it
    if let Some(port_name) = &options.port {
        return Ok(port_name.clone());
    }

    // If port in config, use it
    if let Some(port_name) = &config.connection.port {
        debug!("Using port from config: {port_name}");
        return Ok(port_name.clone());
    }

    let ports = NativePortEnumerator::list_ports()?;
    if ports.is_empty() {
        return Err(anyhow!(
            "no serial ports found; connect the controller or pass --port"
        ));
    }

    // Prefer recognized controller hardware when present
    let known: Vec<PortInfo> = ports.iter().filter(|p| is_known_device(p)).cloned().collect();
    let candidates = if known.is_empty() { ports } else { known };

    if candidates.len() == 1 {
        let port = &candidates[0];
        info!("Auto-selected port: {}", port.name);
        return Ok(port.name.clone());
    }

    if options.non_interactive {
        return Err(anyhow!(
            "multiple serial ports found; pass --port to disambiguate"
        ));
    }

    if !std::io::stdin().is_terminal() || !std::io::stderr().is_terminal() {
        return Err(anyhow!(
            "multiple serial ports found and no terminal for selection; pass --port"
        ));
    }

    let items: Vec<String> = candidates.iter().map(describe).collect();
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select serial port")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(candidates[index].name.clone())
}

/// Offer to remember a freshly selected port in the configuration.
pub fn ask_remember_port(port: &str, config: &mut Config) -> Result<()> {
    if !std::io::stdin().is_terminal() {
        return Ok(());
    }

    let remember = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Remember {} for future runs?", style(port).cyan()))
        .default(false)
        .interact()?;

    if remember {
        config.save_port(port)?;
        eprintln!("{} saved {port} to config", style("✓").green());
    }

    Ok(())
}
