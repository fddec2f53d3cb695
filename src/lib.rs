//! Sensor sampler: simulated dual-channel sensor with a bounded history.
//! Main library: engine modules, logging setup, and the console bootstrap.

pub mod buffer;
pub mod config;
pub mod device;
pub mod engine;
pub mod generator;
pub mod sample;
pub mod scheduler;
pub mod waveform;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use config::SamplerConfig;
use device::{DeviceSession, SensorDevice, READ_CHUNK};
use engine::SensorSampler;
use scheduler::SamplerHandle;

pub use engine::{ChannelSwitch, SamplerError, SamplerStatus};
pub use sample::{Channel, Sample};

/// Logging output format, picked with `SENSOR_LOG_FORMAT`.
const ENV_LOG_FORMAT: &str = "SENSOR_LOG_FORMAT";

/// How long shutdown waits for blocking tasks. The pending stdin read never
/// finishes on its own while the terminal stays open.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Install the global tracing subscriber. Logs go to stderr so stdout stays
/// reserved for device output.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sensor_sampler=info"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Build and run the sampler with a line console on stdin.
/// Returns the process exit code.
pub fn run() -> i32 {
    init_tracing();
    info!("sensor-sampler starting");

    let config = match SamplerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return 2;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sensor-sampler")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return 1;
        }
    };

    runtime.block_on(serve(config));
    shutdown_runtime(runtime);
    0
}

/// Shut the runtime down without waiting on the blocking stdin reader.
fn shutdown_runtime(runtime: tokio::runtime::Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

/// Start the periodic sampler and serve console commands until `quit`,
/// end of input, or Ctrl-C. The sampler is stopped before returning.
pub async fn serve(config: SamplerConfig) {
    info!(
        period_ms = config.period.as_millis() as u64,
        capacity = config.capacity,
        seeded = config.seed.is_some(),
        "sampler configured"
    );

    let sampler = Arc::new(SensorSampler::from_config(&config));
    let handle = SamplerHandle::start(Arc::clone(&sampler), config.period);
    let device = SensorDevice::new(Arc::clone(&sampler));
    let session = device.open();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let mut out = std::io::stdout().lock();
                        match handle_console_line(&session, line.trim(), &mut out)
                            .and_then(|keep_going| out.flush().map(|_| keep_going))
                        {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(e) => {
                                warn!(error = %e, "stdout write failed");
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        }
    }

    drop(session);
    handle.stop().await;
    info!("sensor-sampler exiting");
}

/// Run one console command, writing the response to `out`.
/// Returns Ok(false) when the console should exit.
fn handle_console_line(
    session: &DeviceSession,
    line: &str,
    out: &mut impl Write,
) -> std::io::Result<bool> {
    match line {
        "" => {}
        "quit" | "exit" => return Ok(false),
        "read" => match session.read(READ_CHUNK) {
            Ok(Some(sample)) => write!(out, "{sample}")?,
            Ok(None) => writeln!(out, "no data yet")?,
            Err(e) => writeln!(out, "error: {e}")?,
        },
        "drain" => loop {
            match session.read(READ_CHUNK) {
                Ok(Some(sample)) => write!(out, "{sample}")?,
                Ok(None) => break,
                Err(e) => {
                    writeln!(out, "error: {e}")?;
                    break;
                }
            }
        },
        "status" => match session.status_json() {
            Ok(json) => writeln!(out, "{json}")?,
            Err(e) => writeln!(out, "error: {e}")?,
        },
        other => match session.write(other.as_bytes()) {
            Ok(_) => writeln!(out, "ok")?,
            Err(e) => writeln!(out, "rejected: {e}")?,
        },
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::time::Instant;

    fn console() -> (Arc<SensorSampler>, DeviceSession) {
        let sampler = Arc::new(SensorSampler::with_source(
            NonZeroUsize::new(8).unwrap(),
            0,
            Box::new(fastrand::Rng::with_seed(11)),
        ));
        let session = SensorDevice::new(Arc::clone(&sampler)).open();
        (sampler, session)
    }

    fn run_line(session: &DeviceSession, line: &str) -> (bool, String) {
        let mut out = Vec::new();
        let keep_going = handle_console_line(session, line, &mut out).unwrap();
        (keep_going, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_read_reports_no_data_when_empty() {
        let (_, session) = console();
        assert_eq!(run_line(&session, "read"), (true, "no data yet\n".to_string()));
    }

    #[test]
    fn test_read_and_drain_print_sample_lines() {
        let (sampler, session) = console();
        let first = sampler.tick();
        let second = sampler.tick();
        let third = sampler.tick();

        let (_, out) = run_line(&session, "read");
        assert_eq!(out, device::encode_line(&first));

        let (keep_going, out) = run_line(&session, "drain");
        assert!(keep_going);
        assert_eq!(
            out,
            format!("{}{}", device::encode_line(&second), device::encode_line(&third))
        );
        assert_eq!(run_line(&session, "drain").1, "");
    }

    #[test]
    fn test_channel_and_reset_commands() {
        let (sampler, session) = console();
        sampler.tick();

        assert_eq!(run_line(&session, "0"), (true, "ok\n".to_string()));
        assert_eq!(sampler.status().buffered, 1);

        assert_eq!(run_line(&session, "1"), (true, "ok\n".to_string()));
        assert_eq!(sampler.selected_channel(), Channel::Secondary);
        assert_eq!(sampler.status().buffered, 0);

        sampler.tick();
        assert_eq!(run_line(&session, "reset"), (true, "ok\n".to_string()));
        assert_eq!(sampler.status().cycle_counter, 0);

        let (keep_going, out) = run_line(&session, "7");
        assert!(keep_going);
        assert!(out.starts_with("rejected: invalid channel 7"), "{out}");
    }

    #[test]
    fn test_status_prints_json() {
        let (sampler, session) = console();
        sampler.tick();
        let (keep_going, out) = run_line(&session, "status");
        assert!(keep_going);
        let json: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(json["cycle_counter"], 1);
        assert_eq!(json["selected_channel"], "primary");
    }

    #[test]
    fn test_quit_and_blank_lines() {
        let (_, session) = console();
        assert_eq!(run_line(&session, ""), (true, String::new()));
        assert_eq!(run_line(&session, "quit"), (false, String::new()));
        assert_eq!(run_line(&session, "exit"), (false, String::new()));
    }

    #[test]
    fn test_shutdown_does_not_wait_for_blocking_reader() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (_tx, rx) = std::sync::mpsc::channel::<()>();
        // Stands in for the stdin reader: blocks until the sender drops.
        runtime.spawn_blocking(move || {
            let _ = rx.recv();
        });

        let started = Instant::now();
        shutdown_runtime(runtime);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
