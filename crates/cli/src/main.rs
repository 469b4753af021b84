//! CLI for the parkgate access controller.
//!
//! `simulate` replays a scenario script on a fake clock; `run` drives the
//! controller in real time and takes operator commands on stdin.

mod script;
mod session;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parkgate_control::{JsonStreamSink, ParkingSystem};
use parkgate_core::{Config, Millis, ParkgateError, ParkgateResult};
use parkgate_hal::{Platform, SimPlatform};
use tokio::io::AsyncBufReadExt;

use script::Script;
use session::{BoxedSink, Session};

/// Quiet time appended after a script's last step.
const SETTLE_MS: Millis = 15_000;

#[derive(Parser, Debug)]
#[command(name = "parkgate", version, about = "Parking access controller")]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(short, long, env = "PARKGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scenario script on a simulated clock.
    Simulate {
        #[arg(short, long)]
        script: PathBuf,

        /// Override the script's duration.
        #[arg(long)]
        duration_ms: Option<Millis>,

        /// Print the final status as JSON instead of the boxed report.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Sink output: "ndjson" writes NDJSON to stdout,
        /// "ndjson:/path/to/file" writes to file.
        #[arg(long)]
        sink: Option<String>,
    },
    /// Run in real time against the simulated platform.
    ///
    /// Commands: press <vip|freight|regular|exit> [hold_ms], occupy <n>,
    /// vacate <n>, safety <on|off>, reset, estop, release <n|all>, status, quit.
    Run {
        #[arg(long)]
        sink: Option<String>,
    },
    /// Print the effective configuration as JSON.
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Simulate {
            script,
            duration_ms,
            json,
            sink,
        } => simulate(config, script, duration_ms, json, sink)?,
        Commands::Run { sink } => run(config, sink).await?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> ParkgateResult<Config> {
    match path {
        Some(path) => {
            let config = Config::from_json_file(path)?;
            tracing::info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn open_sink(spec: Option<&str>) -> ParkgateResult<Option<BoxedSink>> {
    let Some(spec) = spec else {
        return Ok(None);
    };
    let writer: Box<dyn Write + Send> = if spec == "ndjson" {
        Box::new(std::io::stdout())
    } else if let Some(path) = spec.strip_prefix("ndjson:") {
        Box::new(std::fs::File::create(path)?)
    } else {
        return Err(ParkgateError::InvalidInput(format!(
            "unknown sink: {spec}. Use 'ndjson' or 'ndjson:/path'"
        )));
    };
    tracing::info!(sink = spec, "ndjson sink enabled");
    Ok(Some(JsonStreamSink::new(writer)))
}

fn simulate(
    config: Config,
    script_path: PathBuf,
    duration_ms: Option<Millis>,
    json: bool,
    sink: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let script = Script::from_json_file(&script_path)?;
    let timeline = script.timeline(&config)?;
    let until = match duration_ms {
        Some(d) => d,
        None => script.duration(&config, SETTLE_MS)?,
    };
    let sinking = sink.is_some();

    tracing::info!(
        script = %script_path.display(),
        steps = script.steps.len(),
        until_ms = until,
        "starting simulation"
    );

    let timing = config.timing.clone();
    let system = ParkingSystem::new(SimPlatform::manual(), config)?;
    let mut session = Session::new(system, open_sink(sink.as_deref())?);
    session.schedule(timeline);
    let mut sched = session::scheduler(&timing, 0);

    session::replay(&mut session, &mut sched, timing.tick_ms, until)?;
    let events = session.events_seen();
    let (system, rows) = session.finish()?;
    let status = system.status(until);

    tracing::info!(events, rows, "simulation complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if sinking {
        // Stdout may carry NDJSON; keep the report off it.
        eprint!("{}", status.render());
    } else {
        print!("{}", status.render());
    }
    Ok(())
}

async fn run(config: Config, sink: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let timing = config.timing.clone();
    let system = ParkingSystem::new(SimPlatform::wall_clock(), config.clone())?;
    let start = system.platform().now_ms();
    let mut session = Session::new(system, open_sink(sink.as_deref())?);
    let mut sched = session::scheduler(&timing, start);

    let lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    tracing::info!(tick_ms = timing.tick_ms, "running; type commands on stdin");
    session::operate(&mut session, &mut sched, &config, lines, ctrl_c).await?;

    let (system, rows) = session.finish()?;
    let now = system.platform().now_ms();
    tracing::info!(rows, uptime_ms = system.uptime(now), "shutting down");
    eprint!("{}", system.status(now).render());
    Ok(())
}
