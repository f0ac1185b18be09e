mod app_config;
mod run_state;
mod sensor;
mod telemetry;
mod vibration;

use anyhow::Context;
use clap::Parser;
use log::{debug, info, trace, warn};
use run_state::{RunState, StopHandle};
use sensor::{SampleSource, SensorReading};
use std::time::{Duration, Instant};
use telemetry::TelemetryForwarder;
use tokio::{
    signal::unix::{signal, Signal, SignalKind},
    time::MissedTickBehavior,
};
use vibration::{SampleOutcome, VibrationEngine};

#[derive(Debug, Parser)]
#[command(version = env!("VERSION"), about)]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    env_logger::init();

    let config = app_config::Config::load(&args.config)?;
    debug!("Config: {:#?}", config);

    let mut source = config
        .sensor
        .open_source()
        .await
        .context("failed to open sensor")?;
    info!("Opened sensor {} ({})", source.sensor_id(), source.unit());

    let mut engine = VibrationEngine::new(
        source.read(),
        config.sensor.interpretation(),
        config.debounce_interval(),
        Instant::now(),
    )
    .context("failed to initialise sensor")?;
    info!(
        "Sensor initialised with {:?}, initial state {}",
        engine.interpretation(),
        engine.state()
    );
    info!("Status:\n{}", engine.status(Instant::now()));

    let timing = Timing {
        poll: config.poll_interval(),
        status: config.status_interval(),
    };

    let forwarder = match config.telemetry {
        Some(telemetry) => {
            let forwarder = TelemetryForwarder::new(telemetry).await?;
            info!("Forwarding telemetry to {}", forwarder.target());
            Some(forwarder)
        }
        None => None,
    };

    let (stop_handle, run_state) = run_state::run_state();
    tokio::spawn(stop_on_signal(
        stop_handle,
        signal(SignalKind::interrupt())?,
        signal(SignalKind::terminate())?,
    ));

    let mut control = ControlSignals {
        config_path: args.config,
        reset_count: signal(SignalKind::user_defined1())?,
        reload: signal(SignalKind::hangup())?,
    };

    info!("Monitoring vibration");
    monitor(
        source.as_mut(),
        &mut engine,
        forwarder.as_ref(),
        &mut control,
        timing,
        run_state,
    )
    .await;

    info!("Final statistics:\n{}", engine.status(Instant::now()));

    Ok(())
}

struct Timing {
    poll: Duration,
    status: Duration,
}

/// Signals that act on the engine while it runs.
struct ControlSignals {
    config_path: String,
    reset_count: Signal,
    reload: Signal,
}

async fn stop_on_signal(stop: StopHandle, mut interrupt: Signal, mut terminate: Signal) {
    tokio::select! {
        _ = interrupt.recv() => info!("Interrupted"),
        _ = terminate.recv() => info!("Terminated"),
    }
    stop.stop();
}

async fn monitor(
    source: &mut dyn SampleSource,
    engine: &mut VibrationEngine,
    forwarder: Option<&TelemetryForwarder>,
    control: &mut ControlSignals,
    timing: Timing,
    mut run_state: RunState,
) {
    let mut poll_interval = tokio::time::interval(timing.poll);
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut status_interval = tokio::time::interval_at(
        tokio::time::Instant::now() + timing.status,
        timing.status,
    );

    let mut last_reading = None;

    while run_state.is_running() {
        tokio::select! {
            _ = run_state.stopped() => {
                info!("Exiting");
            }
            _ = poll_interval.tick() => {
                poll_sensor(source, engine, forwarder, &mut last_reading).await;
            }
            _ = status_interval.tick() => {
                info!("Statistics:\n{}", engine.status(Instant::now()));
                match &last_reading {
                    Some(reading) => info!(
                        "Last good reading {} taken {}ms ago",
                        reading.value.wire_value(),
                        reading.age().as_millis()
                    ),
                    None => warn!("No good reading since startup"),
                }
            }
            _ = control.reset_count.recv() => {
                info!("Resetting vibration count (was {})", engine.vibration_count());
                engine.reset_vibration_count();
            }
            _ = control.reload.recv() => {
                reload_debounce_interval(&control.config_path, engine);
            }
        }
    }
}

async fn poll_sensor(
    source: &mut dyn SampleSource,
    engine: &mut VibrationEngine,
    forwarder: Option<&TelemetryForwarder>,
    last_reading: &mut Option<SensorReading>,
) -> Option<SampleOutcome> {
    let reading = source.read().map(SensorReading::new);
    let now = match &reading {
        Ok(reading) => reading.at,
        Err(_) => Instant::now(),
    };
    let good = reading.as_ref().ok().copied();

    let outcome = match engine.sample(reading.map(|r| r.value), now) {
        Ok(outcome) => {
            trace!(
                "Sample {:?}: {:?}, {}ms since last change",
                good.map(|r| r.value),
                outcome,
                now.saturating_duration_since(engine.last_change_time())
                    .as_millis()
            );

            if outcome.changed {
                info!("State change detected: {}", outcome.state);

                if outcome.state.is_vibrating() {
                    info!("Vibration detected, count: {}", engine.vibration_count());
                }
            }

            Some(outcome)
        }
        Err(e) => {
            warn!(
                "Sensor {} sample failed, keeping {}: {:?}",
                source.sensor_id(),
                e.held_state(),
                anyhow::Error::from(e)
            );
            None
        }
    };

    if let Some(reading) = good {
        if let Some(forwarder) = forwarder {
            if let Err(e) = forwarder
                .send(source.sensor_id(), source.unit(), reading.value)
                .await
            {
                warn!("Failed to send telemetry: {:?}", e);
            }
        }
        *last_reading = Some(reading);
    }

    outcome
}

fn reload_debounce_interval(config_path: &str, engine: &mut VibrationEngine) {
    match app_config::Config::load(config_path) {
        Ok(config) => {
            info!(
                "Debounce interval changed from {}ms to {}ms",
                engine.debounce_interval().as_millis(),
                config.debounce_interval().as_millis()
            );
            engine.set_debounce_interval(config.debounce_interval());
        }
        Err(e) => warn!("Failed to reload config {}: {:?}", config_path, e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use sensor::{test_support::ScriptedSource, RawValue};
    use vibration::{Interpretation, VibrationState};

    #[tokio::test]
    async fn poll_holds_state_on_failure() {
        let mut source = ScriptedSource::new([
            Ok(RawValue::Digital(false)),
            Ok(RawValue::Digital(true)),
            Err(()),
            Ok(RawValue::Digital(true)),
            Ok(RawValue::Digital(false)),
        ]);

        let mut engine = VibrationEngine::new(
            source.read(),
            Interpretation::Digital,
            Duration::ZERO,
            Instant::now(),
        )
        .unwrap();

        let mut last = None;

        let outcome = poll_sensor(&mut source, &mut engine, None, &mut last)
            .await
            .unwrap();
        assert_eq!(outcome.state, VibrationState::Vibrating);
        assert!(outcome.changed);
        let first = last.unwrap();
        assert_eq!(first.value, RawValue::Digital(true));

        assert_eq!(
            poll_sensor(&mut source, &mut engine, None, &mut last).await,
            None
        );
        assert_eq!(engine.state(), VibrationState::Vibrating);
        assert_eq!(last, Some(first));

        let outcome = poll_sensor(&mut source, &mut engine, None, &mut last)
            .await
            .unwrap();
        assert!(!outcome.changed);
        assert!(last.unwrap().at >= first.at);

        let outcome = poll_sensor(&mut source, &mut engine, None, &mut last)
            .await
            .unwrap();
        assert_eq!(outcome.state, VibrationState::Parked);
        assert!(outcome.changed);

        assert_eq!(engine.vibration_count(), 1);
    }
}
