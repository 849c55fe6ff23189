//! CLI tool for telemon

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "telemon")]
#[command(about = "telemon: labeled CPU, GPU, RAM, drive, network and mainboard telemetry", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Update interval in seconds (defaults to the configured interval)
    #[arg(short, long, global = true)]
    interval: Option<f64>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Settings file (defaults to ~/.config/telemon/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of refresh ticks to print
    #[arg(short = 'n', long, default_value = "1", global = true)]
    count: u32,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Show every monitor (default)
    All,
    /// CPU clocks, loads, temperatures, fan and voltage
    Cpu,
    /// GPU clocks, loads, temperature and fan
    Gpu,
    /// Memory load and usage
    Ram,
    /// Drive sensors, throughput and logical disk usage
    Drives,
    /// Network adapter bandwidth
    Network,
    /// Mainboard temperatures and fans
    Mainboard,
    /// Print the effective settings as TOML
    Config,
}

#[cfg(feature = "cli")]
impl Commands {
    fn monitor_type(self) -> Option<telemon::MonitorType> {
        use telemon::MonitorType;

        match self {
            Commands::Cpu => Some(MonitorType::Cpu),
            Commands::Gpu => Some(MonitorType::Gpu),
            Commands::Ram => Some(MonitorType::Ram),
            Commands::Drives => Some(MonitorType::Hd),
            Commands::Network => Some(MonitorType::Network),
            Commands::Mainboard => Some(MonitorType::Mainboard),
            Commands::All | Commands::Config => None,
        }
    }
}

#[cfg(feature = "cli")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use telemon::{Settings, TelemetrySession};

    let cli = Cli::parse();

    env_logger::init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let command = cli.command.unwrap_or(Commands::All);
    if let Commands::Config = command {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let mut session = TelemetrySession::open_default(settings)?;
    let interval = match cli.interval {
        Some(seconds) => Duration::from_secs_f64(seconds.max(0.1)),
        None => session.interval(),
    };
    let filter = command.monitor_type();

    for tick in 0..cli.count.max(1) {
        if tick > 0 {
            std::thread::sleep(interval);
            session.update()?;
        }

        let mut snapshot = session.snapshot();
        if let Some(monitor_type) = filter {
            snapshot.monitors.retain(|m| m.monitor_type == monitor_type);
        }

        if cli.format == "json" {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        } else {
            print_snapshot(&snapshot);
        }
    }

    for failure in session.manager().failures() {
        eprintln!(
            "[WARN] {} monitor '{}' disabled: {}",
            failure.monitor_type, failure.name, failure.reason
        );
    }

    session.close();
    Ok(())
}

#[cfg(feature = "cli")]
fn print_snapshot(snapshot: &telemon::Snapshot) {
    println!("--- {} ---", snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC"));

    if snapshot.monitors.is_empty() {
        println!("No monitors available");
        return;
    }

    for monitor in &snapshot.monitors {
        if monitor.show_name {
            println!("=== {}: {} ===", monitor.monitor_type, monitor.name);
        } else {
            println!("=== {} ===", monitor.monitor_type);
        }
        for reading in &monitor.readings {
            let marker = if reading.is_alert { " [ALERT]" } else { "" };
            // adapter and volume readings carry their owner in the label only
            if reading.text.starts_with(&reading.label) {
                println!("  {}{}", reading.text, marker);
            } else {
                println!("  {} | {}{}", reading.label, reading.text, marker);
            }
        }
    }
    println!();
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
