use anyhow::Result;
use log::info;
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use scopetab::core::{Channel, SeriesKey};
use scopetab::engine::{AcquisitionConfig, AcquisitionSession};
use scopetab::export::ExportOptions;
use scopetab::hal::mock::{SimulatedScope, SimulatedTrace, SimulatedTransport};
use scopetab::hal::{list_devices, InstrumentTransport};

const ADDRESS: &str = "TCPIP0::192.168.1.50::inst0::INSTR";
const SAMPLE_RATE: f64 = 10_000.0;

/// Ring-down of a 120 Hz mode with 2% damping, in sensor volts.
fn ring_down(n: usize) -> Vec<f64> {
    let omega = 2.0 * PI * 120.0;
    let decay = 0.02 * omega;
    (0..n)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            4.0 * (-decay * t).exp() * (omega * t - 0.3).cos()
        })
        .collect()
}

/// Steady vibration at 50 Hz and 310 Hz.
fn vibration(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            2.0 * (2.0 * PI * 50.0 * t).sin() + 0.5 * (2.0 * PI * 310.0 * t).sin()
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("ScopeTab - Simulated Acquisition Demo");
    println!("=====================================\n");

    let scope = SimulatedScope::new()
        .with_trace(Channel(1), SimulatedTrace::from_volts(&ring_down(20_000), SAMPLE_RATE, 5.0, 0.0))
        .with_trace(Channel(2), SimulatedTrace::from_volts(&vibration(60_000), SAMPLE_RATE, 5.0, 0.0))
        .with_latency(Duration::from_millis(20));
    let transport: Arc<dyn InstrumentTransport> =
        Arc::new(SimulatedTransport::new().with_instrument(ADDRESS, scope));

    let devices = list_devices(transport.as_ref()).await;
    println!("Devices: {:?}\n", devices);

    let config = AcquisitionConfig::from_json(serde_json::json!({
        "address": devices[0],
        "channels": [1, 2],
        "modes": ["time_domain", "frequency_domain", "resonance"],
        "estimator": "welch",
        "chunk_size": 50000
    }))?;

    let mut session = AcquisitionSession::new(config)?;
    session.start(transport)?;

    while session.is_running() {
        let progress = session.progress();
        println!(
            "  channel {}/{}: {:>5.1}%",
            progress.iteration + 1,
            progress.total_channels,
            progress.fraction * 100.0
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let report = session.wait().await?;
    println!("\nRun status: {:?} in {:?}\n", report.status, report.duration);

    for (channel, bundle) in session.channel_data().iter() {
        println!("[{}] {} samples", channel, bundle.get(SeriesKey::Time).map_or(0, |t| t.len()));
        match &bundle.resonance {
            Some(Ok(fit)) => println!(
                "  f0 = {:.2} Hz, zeta = {:.4}, delta = {:.4} ({} iterations)",
                fit.params.omega / (2.0 * PI),
                fit.damping_ratio,
                fit.log_decrement,
                fit.iterations
            ),
            Some(Err(e)) => println!("  resonance fit: {}", e),
            None => {}
        }
    }
    for (channel, error) in report.failed() {
        println!("[{}] failed: {}", channel, error);
    }

    println!("\n{}", report.monitor().generate_report());

    let path = session.save_csv(std::env::temp_dir().join("scopetab"), &ExportOptions::default())?;
    info!("saved {}", path.display());
    println!("Results written to {}", path.display());

    Ok(())
}
