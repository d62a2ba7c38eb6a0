//! Fixed-rate driver – feeds [`CutsceneService::tick`] from a tokio interval.
//!
//! ## Event contract (outbound)
//!
//! | Subject                     | Payload                                  |
//! |-----------------------------|------------------------------------------|
//! | `cutscene.session.tick`     | `PlaybackEvent::Tick(SessionTick)`       |
//! | `cutscene.session.stopped`  | `PlaybackEvent::Stopped(SessionStopped)` |
//!
//! `cutscene.session.started` is produced by whoever calls
//! [`CutsceneService::start`]; the driver only sees ticks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;

use crate::protocol::PlaybackEvent;
use crate::service::{CutsceneService, TickReport};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Tick rate in Hz.
    pub tick_rate_hz: f32,
    /// Return once no session is left instead of idling until Ctrl-C.
    pub exit_when_idle: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            exit_when_idle: false,
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackDriver
// ---------------------------------------------------------------------------

/// Wraps a [`CutsceneService`] and ticks it at a fixed rate.
///
/// Call [`PlaybackDriver::run`] inside a Tokio runtime.
pub struct PlaybackDriver {
    config: DriverConfig,
    service: Arc<Mutex<CutsceneService>>,
}

impl PlaybackDriver {
    pub fn new(config: DriverConfig, service: Arc<Mutex<CutsceneService>>) -> Self {
        Self { config, service }
    }

    pub fn service(&self) -> &Arc<Mutex<CutsceneService>> {
        &self.service
    }

    /// Run exactly one service tick, holding the lock only for the tick.
    pub fn tick_once(&self) -> TickReport {
        let span = tracing::trace_span!("playback_tick");
        let _enter = span.enter();
        self.service.lock().tick()
    }

    /// Tick until Ctrl-C (or until idle, if configured). Every produced event
    /// is sent on `events`; on Ctrl-C all sessions are shut down first.
    pub async fn run(self, events: UnboundedSender<PlaybackEvent>) -> Result<()> {
        ensure!(
            self.config.tick_rate_hz > 0.0,
            "tick rate must be positive, got {}",
            self.config.tick_rate_hz
        );

        info!(
            "PlaybackDriver active – ticking at {:.0}Hz",
            self.config.tick_rate_hz
        );

        // -------------------------------------------------------------------
        // Tick loop
        // -------------------------------------------------------------------

        let service = self.service.clone();
        let tick_events = events.clone();
        let period = Duration::from_secs_f32(1.0 / self.config.tick_rate_hz);
        let exit_when_idle = self.config.exit_when_idle;

        let mut tick_handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;

                let (report, idle) = {
                    let span = tracing::trace_span!("playback_tick");
                    let _enter = span.enter();
                    let mut svc = service.lock();
                    let report = svc.tick();
                    (report, svc.is_idle())
                };

                if !report.is_empty() {
                    debug!(
                        "Tick {}: {} update(s), {} stop(s)",
                        report.tick,
                        report.updates.len(),
                        report.stopped.len()
                    );
                }
                for event in report.into_events() {
                    if tick_events.send(event).is_err() {
                        warn!("Event receiver dropped; stopping tick loop");
                        return;
                    }
                }

                if exit_when_idle && idle {
                    info!("No sessions left; PlaybackDriver exiting");
                    return;
                }
            }
        });

        // -------------------------------------------------------------------
        // Wait for completion or shutdown signal
        // -------------------------------------------------------------------

        tokio::select! {
            joined = &mut tick_handle => {
                if let Err(e) = joined {
                    log::error!("Playback tick loop exited unexpectedly: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("PlaybackDriver shutting down (SIGINT)");
                tick_handle.abort();
                let stopped = self.service.lock().shutdown();
                for s in stopped {
                    // Receiver may already be gone at shutdown.
                    let _ = events.send(PlaybackEvent::Stopped(s));
                }
            }
        }

        Ok(())
    }
}
