//! Measurement Agent CLI
//!
//! Periodic 72-dimension data acquisition on a simulated power monitor.

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use measurement_agent::{
    decode_records, encode_records, AgentResources, BatchSummary, Config, LifecycleState,
    Measurement, MeasurementAgent, RECORD_LAYOUT, RECORD_SIZE, VERSION,
};
use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "measurement-agent")]
#[command(version = VERSION)]
#[command(about = "Periodic 72-dimension measurement capture", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture measurements until the duration elapses or Ctrl+C
    Run {
        /// Stop after this many seconds (runs until Ctrl+C if omitted)
        #[arg(long)]
        duration: Option<u64>,

        /// How often to drain the buffer, in milliseconds
        #[arg(long, default_value = "20")]
        drain_interval_ms: u64,

        /// Output file (defaults to a timestamped file in the export directory)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "bin")]
        format: OutputFormat,

        /// Seed for the noise generators
        #[arg(long)]
        seed: Option<u64>,

        /// Probability of a simulated sensor fault per register transfer
        #[arg(long)]
        fault_rate: Option<f64>,
    },

    /// Drive the agent interactively: type start, stop or quit
    Console {
        /// How often to drain and summarise, in milliseconds
        #[arg(long, default_value = "1000")]
        drain_interval_ms: u64,
    },

    /// Decode a binary dump
    Decode {
        /// File written by `run --format bin`
        file: PathBuf,

        /// Print every record as a JSON line instead of a summary
        #[arg(long)]
        jsonl: bool,
    },

    /// Show the record layout
    Layout,

    /// Show configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Bin,
    Jsonl,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Bin => "bin",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            duration,
            drain_interval_ms,
            output,
            format,
            seed,
            fault_rate,
        } => {
            cmd_run(
                duration.map(Duration::from_secs),
                Duration::from_millis(drain_interval_ms.max(1)),
                output,
                format,
                seed,
                fault_rate,
            );
        }
        Commands::Console { drain_interval_ms } => {
            cmd_console(Duration::from_millis(drain_interval_ms.max(1)));
        }
        Commands::Decode { file, jsonl } => {
            cmd_decode(&file, jsonl);
        }
        Commands::Layout => {
            cmd_layout();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load configuration, using defaults: {e}");
            Config::default()
        }
    }
}

fn init_agent(config: &Config) -> MeasurementAgent {
    match MeasurementAgent::init(config, AgentResources::simulated(config)) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Error initializing agent: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_run(
    duration: Option<Duration>,
    drain_interval: Duration,
    output: Option<PathBuf>,
    format: OutputFormat,
    seed: Option<u64>,
    fault_rate: Option<f64>,
) {
    println!("Measurement Agent v{VERSION}");
    println!();

    let mut config = load_config();
    if seed.is_some() {
        config.noise_seed = seed;
    }
    if let Some(rate) = fault_rate {
        config.sensor.fault_rate = rate;
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let output_path = match output {
        Some(path) => path,
        None => {
            if let Err(e) = config.ensure_directories() {
                eprintln!("Warning: Could not create directories: {e}");
            }
            config.export_path.join(format!(
                "measurements_{}.{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                format.extension()
            ))
        }
    };

    let mut writer = match File::create(&output_path) {
        Ok(file) => BufWriter::new(file),
        Err(e) => {
            eprintln!("Error creating {output_path:?}: {e}");
            std::process::exit(1);
        }
    };

    let mut agent = init_agent(&config);

    println!("Instance ID: {}", agent.instance_id());
    println!("  Sample period: {} µs", config.sample_period.as_micros());
    println!("  Buffer capacity: {}", agent.capacity());
    println!("  Drain interval: {} ms", drain_interval.as_millis());
    println!("  Output: {output_path:?} ({})", format.extension());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    if let Err(e) = agent.write(b"start\n") {
        eprintln!("Error starting capture: {e}");
        std::process::exit(1);
    }

    let started = Instant::now();
    let mut written = 0usize;
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        if duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(drain_interval);

        let batch = agent.drain();
        if let Err(e) = write_batch(&mut writer, &batch, format) {
            eprintln!("Error writing measurements: {e}");
            break;
        }
        written += batch.len();

        if last_report.elapsed() >= Duration::from_secs(1) && !batch.is_empty() {
            println!(
                "[{}] {}",
                Utc::now().format("%H:%M:%S"),
                BatchSummary::from_measurements(&batch).line()
            );
            last_report = Instant::now();
        }
    }

    println!();
    println!("Stopping capture...");
    let _ = agent.write(b"stop\n");

    // Whatever the worker finished after the last drain.
    let batch = agent.drain();
    if let Err(e) = write_batch(&mut writer, &batch, format) {
        eprintln!("Error writing measurements: {e}");
    }
    written += batch.len();

    if let Err(e) = writer.flush() {
        eprintln!("Error flushing {output_path:?}: {e}");
    }

    println!("Wrote {written} measurements to {output_path:?}");
    println!("Pulse edges: {}", agent.calibration().pulse_count());
    println!();
    println!("{}", agent.stats().summary());

    agent.shutdown();
}

fn write_batch(
    writer: &mut impl Write,
    batch: &[Measurement],
    format: OutputFormat,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Bin => writer.write_all(&encode_records(batch)),
        OutputFormat::Jsonl => {
            for measurement in batch {
                serde_json::to_writer(&mut *writer, measurement)?;
                writer.write_all(b"\n")?;
            }
            Ok(())
        }
    }
}

fn cmd_console(drain_interval: Duration) {
    let config = load_config();
    let mut agent = init_agent(&config);

    println!("Measurement Agent v{VERSION} console");
    println!("Instance ID: {}", agent.instance_id());
    println!("Commands: start, stop, quit");
    println!();

    let (lines_tx, lines) = crossbeam_channel::unbounded::<String>();
    let spawned = thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if lines_tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        eprintln!("Error reading console input: {e}");
        std::process::exit(1);
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let mut last_drain = Instant::now();

    while running.load(Ordering::SeqCst) {
        match lines.recv_timeout(Duration::from_millis(50)) {
            Ok(line) if line.trim() == "quit" => break,
            Ok(line) => match agent.write(line.as_bytes()) {
                Ok(_) => println!("state: {}", agent.state()),
                Err(e) => eprintln!("Error: {e}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_drain.elapsed() >= drain_interval {
            let batch = agent.drain();
            if !batch.is_empty() {
                println!(
                    "[{}] {}",
                    Utc::now().format("%H:%M:%S"),
                    BatchSummary::from_measurements(&batch).line()
                );
            } else if agent.state() == LifecycleState::Running {
                println!("[{}] buffer empty", Utc::now().format("%H:%M:%S"));
            }
            last_drain = Instant::now();
        }
    }

    agent.shutdown();
    println!();
    println!("{}", agent.stats().summary());
}

fn cmd_decode(file: &Path, jsonl: bool) {
    let data = match std::fs::read(file) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error reading {file:?}: {e}");
            std::process::exit(1);
        }
    };

    let measurements = match decode_records(&data) {
        Ok(measurements) => measurements,
        Err(e) => {
            eprintln!("Error decoding {file:?}: {e}");
            std::process::exit(1);
        }
    };

    if jsonl {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for measurement in &measurements {
            if serde_json::to_writer(&mut out, measurement).is_err() || out.write_all(b"\n").is_err()
            {
                // Downstream closed the pipe.
                return;
            }
        }
        return;
    }

    let summary = BatchSummary::from_measurements(&measurements);
    println!("File: {file:?}");
    println!("Records: {} ({} bytes each)", summary.count, RECORD_SIZE);
    if let (Some(first), Some(last)) = (summary.first, summary.last) {
        println!("First: {}", first.to_rfc3339());
        println!("Last: {}", last.to_rfc3339());
    }
    println!("{}", summary.line());
}

fn cmd_layout() {
    println!("{RECORD_LAYOUT}");
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
