//! Recording session loop: batch -> buffer -> windows -> detector -> lobe point
//!
//! One task owns the buffer, the scheduler and the cut session, so window
//! computation for a batch always finishes before the next batch is read.
//! Lobe-point measurements go to the machine, which may be slow, so they run
//! as background tasks on a [`JoinSet`] and report back over a channel that
//! is drained between batches. Load and stop-cycle polling runs the same way:
//! one status poll in flight at a time, collected by whichever batch finds it
//! finished, so a hung controller never holds up ingestion.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::{BatchEvent, SampleSource};
use super::{CutSession, SampleBuffer, SessionReport, StopReason, WindowPlan, WindowScheduler};
use crate::config::defaults::MAX_CONSECUTIVE_SOURCE_FAULTS;
use crate::config::ChatterConfig;
use crate::machine::{MachineMonitor, MachineQueryError, MachineStatus, WorkpieceGeometry};
use crate::processing::{FilterDesigner, ProcessingError, WindowAnalyzer};
use crate::storage::Capture;
use crate::types::{LobePoint, Sample, Window};

type Measurement = Result<Option<LobePoint>, MachineQueryError>;

/// Owns everything one recording session needs.
///
/// Built with [`new()`](ProcessingLoop::new), then consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    config: ChatterConfig,
    monitor: MachineMonitor,
    geometry: WorkpieceGeometry,
    cancel_token: CancellationToken,
}

impl ProcessingLoop {
    pub fn new(config: &ChatterConfig, monitor: MachineMonitor, cancel_token: CancellationToken) -> Self {
        Self {
            geometry: WorkpieceGeometry::from_config(&config.machine),
            config: config.clone(),
            monitor,
            cancel_token,
        }
    }

    fn query_budget(&self) -> Duration {
        // A lobe-point measurement makes up to three bounded queries
        Duration::from_millis(self.config.machine.query_timeout_ms.saturating_mul(3))
    }

    /// Run one recording session until the source ends, the machine stops,
    /// or the session is cancelled.
    ///
    /// Only configuration errors (filter design, window plan) are returned;
    /// per-window, acquisition and machine faults are absorbed and counted.
    pub async fn run<S: SampleSource>(self, source: &mut S) -> Result<SessionReport, ProcessingError> {
        let rate = self.config.acquisition.sample_rate_hz;
        let rpm = self.monitor.spindle_rpm_or(self.config.analysis.nominal_rpm).await;

        let analyzer = WindowAnalyzer::from_config(&mut FilterDesigner::new(), &self.config, rate, rpm)?;
        let plan = WindowPlan::from_seconds(rate, self.config.analysis.window_seconds, self.config.analysis.step_seconds)?;
        let skip_samples = (self.config.analysis.skip_seconds * rate).round() as usize;
        let mut scheduler = WindowScheduler::new(plan, analyzer).starting_at_sample(skip_samples);
        let mut cut = CutSession::new(
            self.config.detection.threshold,
            self.config.detection.max_points_per_cut,
        );

        let mut buffer = SampleBuffer::new();
        let mut retained: Option<Vec<Sample>> = self.config.analysis.retain_capture.then(Vec::new);
        let mut loads = Vec::new();
        let mut measurements = JoinSet::new();
        let mut status_poll: Option<JoinHandle<MachineStatus>> = None;
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Measurement>();

        let mut batches = 0u64;
        let mut source_faults = 0u64;
        let mut consecutive_faults = 0u32;
        let started = Instant::now();

        info!(
            source = source.source_name(),
            machine = self.monitor.machine_name(),
            rpm,
            window = plan.window,
            step = plan.step,
            indicator = %self.config.analysis.indicator,
            "📊 Recording session started"
        );
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let stop_reason = loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break StopReason::Cancelled;
                }
                result = source.next_batch() => result,
            };

            let batch = match event {
                Ok(BatchEvent::Batch(batch)) => {
                    consecutive_faults = 0;
                    batch
                }
                Ok(BatchEvent::Eof) => {
                    info!(batches, "[ProcessingLoop] Source reached end");
                    break StopReason::SourceExhausted;
                }
                Err(e) => {
                    source_faults += 1;
                    consecutive_faults += 1;
                    warn!(error = %e, consecutive = consecutive_faults, "[ProcessingLoop] Batch dropped");
                    if consecutive_faults >= MAX_CONSECUTIVE_SOURCE_FAULTS {
                        warn!("[ProcessingLoop] Source keeps failing, ending session");
                        break StopReason::SourceFailed;
                    }
                    continue;
                }
            };
            batches += 1;

            let appended = buffer.extend(&batch);
            if let Some(capture) = retained.as_mut() {
                let end = buffer.len();
                if let Some(new) = buffer.window(Window::new(end - appended, end)) {
                    capture.extend_from_slice(new);
                }
            }

            for reading in scheduler.poll(&buffer) {
                debug!(t = reading.t, value = reading.value, "Chatter reading");
                if cut.observe(&reading) {
                    let monitor = self.monitor.clone();
                    let geometry = self.geometry.clone();
                    let tx = outcome_tx.clone();
                    measurements.spawn(async move {
                        let outcome = monitor.measure_lobe_point(&geometry).await;
                        // The receiver only closes once the session is over
                        let _ = tx.send(outcome);
                    });
                }
            }
            while let Ok(outcome) = outcome_rx.try_recv() {
                cut.resolve(outcome);
            }

            buffer.discard_before(scheduler.retain_from());

            if status_poll.is_none() {
                if let Some(t) = buffer.last_time() {
                    let monitor = self.monitor.clone();
                    status_poll = Some(tokio::spawn(async move { monitor.poll_status(t).await }));
                    // Let a responsive controller answer within this batch
                    tokio::task::yield_now().await;
                }
            }
            match status_poll.take() {
                Some(handle) if handle.is_finished() => match handle.await {
                    Ok(status) => {
                        loads.push(status.loads);
                        if status.motion_stopped {
                            info!(batches, "[ProcessingLoop] Stop-cycle reported, ending session");
                            break StopReason::MotionStopped;
                        }
                    }
                    Err(e) => warn!(error = %e, "[ProcessingLoop] Machine status poll failed"),
                },
                pending => {
                    if pending.is_some() {
                        debug!(batches, "[ProcessingLoop] Machine status still pending");
                    }
                    status_poll = pending;
                }
            }
        };

        if let Some(handle) = status_poll.take() {
            handle.abort();
        }

        drop(outcome_tx);
        let drain = async { while measurements.join_next().await.is_some() {} };
        if tokio::time::timeout(self.query_budget(), drain).await.is_err() {
            warn!(pending = cut.pending(), "Abandoning unfinished lobe-point measurements");
            measurements.abort_all();
        }
        while let Ok(outcome) = outcome_rx.try_recv() {
            cut.resolve(outcome);
        }

        let samples = buffer.len();
        let rejected_samples = buffer.rejected();
        let schedule = scheduler.finalize();
        let excursions = cut.excursions();
        let machine_failures = self.monitor.query_failures();
        let elapsed = started.elapsed().as_secs_f64();

        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 SESSION STATISTICS");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("   Stop Reason:          {}", stop_reason);
        info!("   Spindle Speed:        {:.0} rpm", rpm);
        info!("   Batches:              {} ({} faulted)", batches, source_faults);
        info!("   Samples:              {} ({} rejected)", samples, rejected_samples);
        info!("   Windows Analysed:     {}", schedule.windows_analyzed);
        info!("   Readings:             {}", schedule.readings.len());
        info!("   Windows Skipped:      {}", schedule.skips);
        info!("   Chatter Excursions:   {}", excursions);
        info!("   Lobe Points:          {}", cut.points().len());
        info!("   Machine Query Errors: {}", machine_failures);
        info!("   Elapsed:              {:.1} s", elapsed);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        source.log_report();

        Ok(SessionReport {
            rpm,
            batches,
            samples,
            rejected_samples,
            source_faults,
            schedule,
            excursions,
            lobe_points: cut.into_points(),
            capture: retained.map(|samples| Capture::new(samples).with_loads(loads)),
            stop_reason,
        })
    }
}
