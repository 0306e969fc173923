//! Demonstration of the measurement pipeline.
//!
//! This example shows how to:
//! 1. Initialize an agent with a simulated sensor and pulse line
//! 2. Start and stop capture through the textual control channel
//! 3. Read drained measurements back as binary records
//! 4. Decode the records and summarise them
//!
//! Run with: cargo run --example capture_demo

use std::thread;
use std::time::Duration;

use measurement_agent::{
    decode_records, AgentResources, BatchSummary, Config, MeasurementAgent, DIMENSIONS,
    RECORD_SIZE,
};

fn main() {
    println!("Measurement Agent - Capture Demo");
    println!("================================");
    println!();

    let mut config = Config::default();
    config.noise_seed = Some(42);
    config.pulse_interval = Duration::from_millis(100);

    let mut agent = match MeasurementAgent::init(&config, AgentResources::simulated(&config)) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Failed to initialize agent: {e}");
            return;
        }
    };

    println!("Instance ID: {}", agent.instance_id());
    println!("State: {}", agent.state());
    println!();

    if let Err(e) = agent.write(b"start\n") {
        eprintln!("Failed to start: {e}");
        return;
    }
    println!("State: {}", agent.state());
    println!();

    for round in 1..=5 {
        thread::sleep(Duration::from_millis(250));

        let records = agent.read();
        let measurements = match decode_records(&records) {
            Ok(measurements) => measurements,
            Err(e) => {
                eprintln!("Decode failed: {e}");
                break;
            }
        };

        println!(
            "Read {round}: {} bytes / {RECORD_SIZE} = {} records",
            records.len(),
            measurements.len()
        );
        println!("  {}", BatchSummary::from_measurements(&measurements).line());

        if let Some(last) = measurements.last() {
            println!(
                "  last: cycle delta {:.0}, energy {:.3} µJ, dims[{}] = {:.3}",
                last.dimensions[0],
                last.dimensions[2],
                DIMENSIONS - 1,
                last.dimensions[DIMENSIONS - 1]
            );
        }

        match agent.drift_since_pulse() {
            Some(drift) => println!("  drift since last pulse: {drift} ticks"),
            None => println!("  no pulse yet"),
        }
        println!();
    }

    let _ = agent.write(b"stop\n");
    println!("State: {}", agent.state());
    println!("Left over after stop: {} records", agent.drain().len());
    println!();

    agent.shutdown();
    println!("{}", agent.stats().summary());
}
