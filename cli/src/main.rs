mod config;
mod logging;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use serde::Serialize;
use surge_platform::{
    MatchMode, PowerGadget, PowerSampler, RaplPower, Tdp, TdpRegistry, DEFAULT_CPU_POWER_WATTS,
};
use tracing::debug;

use config::{LogLevel, UserConfig};

#[derive(Debug, Parser)]
#[command(
    name = "surge",
    version,
    about = "Estimate the host CPU's instantaneous power draw"
)]
struct Cli {
    /// Vendor tool logging duration (e.g. "1s", "500ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    duration: Option<Duration>,

    /// Vendor tool sampling resolution in milliseconds
    #[arg(long)]
    resolution: Option<u32>,

    /// Energy counter root (Linux powercap tree)
    #[arg(long)]
    rapl_root: Option<PathBuf>,

    /// Directory for the vendor tool's log file
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Accept the first of several equally-plausible CPU model matches
    #[arg(long)]
    greedy: bool,

    /// CSV dataset with `Name,TDP` columns replacing the bundled one
    #[arg(long)]
    tdp_dataset: Option<PathBuf>,

    /// Emit the estimate as JSON
    #[arg(long)]
    json: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

/// One point-in-time estimate, tagged with the strategy that produced it.
#[derive(Debug, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
enum Estimate {
    EnergyCounters { power_watts: BTreeMap<String, f64> },
    LoggedTool { metrics: BTreeMap<String, f64> },
    ConstantPower {
        model: String,
        tdp_watts: Option<f64>,
        fallback_watts: f64,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let mut config = UserConfig::load();
    apply_overrides(&mut config, &cli);
    logging::init(config.log_level);

    let estimate = estimate(&config)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        print_text(&estimate);
    }
    Ok(())
}

fn apply_overrides(config: &mut UserConfig, cli: &Cli) {
    if let Some(duration) = cli.duration {
        config.duration_secs = duration.as_secs().max(1);
    }
    if let Some(resolution) = cli.resolution {
        config.resolution_ms = resolution;
    }
    if let Some(root) = &cli.rapl_root {
        config.rapl_root = Some(root.clone());
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if cli.greedy {
        config.greedy = true;
    }
    if let Some(dataset) = &cli.tdp_dataset {
        config.tdp_dataset = Some(dataset.clone());
    }
    if let Some(level) = cli.log_level.as_deref() {
        config.log_level = LogLevel::from_str(level);
    }
}

/// Pick the first usable measurement strategy: hardware energy counters,
/// then the vendor logging tool, then the constant-power lookup.
fn estimate(config: &UserConfig) -> Result<Estimate> {
    if let Some(mut backend) = build_counters(config) {
        return Ok(Estimate::EnergyCounters {
            power_watts: backend.sample().into_iter().collect(),
        });
    }

    if let Some(mut backend) = build_gadget(config) {
        return Ok(Estimate::LoggedTool {
            metrics: backend.sample().into_iter().collect(),
        });
    }

    let registry = match &config.tdp_dataset {
        Some(path) => TdpRegistry::from_path(path)?,
        None => TdpRegistry::bundled(),
    };
    let mode = if config.greedy {
        MatchMode::Greedy
    } else {
        MatchMode::Strict
    };
    let tdp = Tdp::detect(&registry, mode);
    Ok(Estimate::ConstantPower {
        model: tdp.model().to_string(),
        tdp_watts: tdp.tdp_watts(),
        fallback_watts: DEFAULT_CPU_POWER_WATTS,
    })
}

fn build_counters(config: &UserConfig) -> Option<RaplPower> {
    let backend = match &config.rapl_root {
        Some(root) => RaplPower::with_root(root),
        None => RaplPower::new(),
    };
    match backend {
        Ok(backend) => Some(backend),
        Err(e) => {
            debug!(error = %e, "Energy counter backend unavailable");
            None
        }
    }
}

fn build_gadget(config: &UserConfig) -> Option<PowerGadget> {
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let duration = Duration::from_secs(config.duration_secs);
    match PowerGadget::with_options(&output_dir, duration, config.resolution_ms) {
        Ok(backend) => Some(backend),
        Err(e) => {
            debug!(error = %e, "Logged-tool backend unavailable");
            None
        }
    }
}

fn print_text(estimate: &Estimate) {
    match estimate {
        Estimate::EnergyCounters { power_watts } => {
            if power_watts.is_empty() {
                println!("Energy counters produced no measurements this cycle.");
                return;
            }
            println!("CPU power (energy counters):");
            for (domain, watts) in power_watts {
                println!("  {domain:<40} {watts:>9.3} W");
            }
        }
        Estimate::LoggedTool { metrics } => {
            if metrics.is_empty() {
                println!("Intel Power Gadget produced no measurements this cycle.");
                return;
            }
            println!("CPU power (Intel Power Gadget):");
            for (metric, value) in metrics {
                println!("  {metric:<40} {value:>12.3}");
            }
        }
        Estimate::ConstantPower {
            model,
            tdp_watts,
            fallback_watts,
        } => {
            println!("CPU model: {model}");
            match tdp_watts {
                Some(watts) => println!("Constant power (vendor TDP): {watts} W"),
                None => println!("TDP unknown; assuming a default of {fallback_watts} W"),
            }
        }
    }
}
