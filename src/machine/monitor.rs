//! Timeout-bounded machine queries with last-known-good fallback

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Axis, MachineQueryError, MachineState, WorkpieceGeometry};
use crate::types::{LoadSample, LobePoint};

const AXES: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

fn axis_slot(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LastKnown {
    rpm: Option<f64>,
    spindle_load: Option<f64>,
    axis_load: [Option<f64>; 3],
    position: [Option<f64>; 3],
}

/// Loads and stop-cycle state from one status poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineStatus {
    pub loads: LoadSample,
    /// `false` when the stop-cycle query failed
    pub motion_stopped: bool,
}

/// Shared handle for querying the machine from any task.
#[derive(Clone)]
pub struct MachineMonitor {
    machine: Arc<dyn MachineState>,
    timeout: Duration,
    last_known: Arc<Mutex<LastKnown>>,
    failures: Arc<AtomicU64>,
}

impl MachineMonitor {
    pub fn new(machine: Arc<dyn MachineState>, timeout: Duration) -> Self {
        Self {
            machine,
            timeout,
            last_known: Arc::new(Mutex::new(LastKnown::default())),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn machine_name(&self) -> &str {
        self.machine.machine_name()
    }

    /// Failed or timed-out queries so far.
    pub fn query_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    async fn bounded<T>(
        &self,
        query: &'static str,
        fut: impl Future<Output = Result<T, MachineQueryError>>,
    ) -> Result<T, MachineQueryError> {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MachineQueryError::Timeout {
                query,
                timeout_ms: self.timeout.as_millis().try_into().unwrap_or(u64::MAX),
            }),
        };
        if let Err(ref e) = result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            debug!(query, error = %e, "Machine query failed");
        }
        result
    }

    fn remember(&self, update: impl FnOnce(&mut LastKnown)) {
        if let Ok(mut last) = self.last_known.lock() {
            update(&mut last);
        }
    }

    fn recall(&self) -> LastKnown {
        self.last_known.lock().map(|last| *last).unwrap_or_default()
    }

    pub async fn spindle_rpm(&self) -> Result<f64, MachineQueryError> {
        let rpm = self.bounded("spindle_rpm", self.machine.spindle_rpm()).await?;
        self.remember(|last| last.rpm = Some(rpm));
        Ok(rpm)
    }

    /// Spindle speed, else the last good reading, else `fallback`.
    pub async fn spindle_rpm_or(&self, fallback: f64) -> f64 {
        match self.spindle_rpm().await {
            Ok(rpm) if rpm > 0.0 => rpm,
            Ok(rpm) => {
                warn!(rpm, fallback, "Spindle not turning, using nominal speed");
                fallback
            }
            Err(e) => {
                let rpm = self.recall().rpm.unwrap_or(fallback);
                warn!(error = %e, rpm, "Spindle speed unavailable, using last known");
                rpm
            }
        }
    }

    pub async fn axis_position(&self, axis: Axis) -> Result<f64, MachineQueryError> {
        let position = self.bounded("axis_position", self.machine.axis_position(axis)).await?;
        self.remember(|last| last.position[axis_slot(axis)] = Some(position));
        Ok(position)
    }

    /// Loads for one batch, queried concurrently. Each missing value falls back
    /// to its last good reading, then zero.
    pub async fn load_sample(&self, t: f64) -> LoadSample {
        let [x, y, z] = AXES.map(|a| self.bounded("axis_load", self.machine.axis_load(a)));
        let (spindle, x, y, z) = tokio::join!(
            self.bounded("spindle_load", self.machine.spindle_load()),
            x,
            y,
            z
        );
        let spindle = spindle.ok();
        let axis = [x.ok(), y.ok(), z.ok()];

        self.remember(|last| {
            last.spindle_load = spindle.or(last.spindle_load);
            for (slot, value) in axis.iter().enumerate() {
                last.axis_load[slot] = value.or(last.axis_load[slot]);
            }
        });
        let last = self.recall();
        LoadSample {
            t,
            spindle: last.spindle_load.unwrap_or(0.0),
            x: last.axis_load[0].unwrap_or(0.0),
            y: last.axis_load[1].unwrap_or(0.0),
            z: last.axis_load[2].unwrap_or(0.0),
        }
    }

    pub async fn cycle_active(&self) -> Result<bool, MachineQueryError> {
        self.bounded("cycle_active", self.machine.cycle_active()).await
    }

    pub async fn motion_stopped(&self) -> Result<bool, MachineQueryError> {
        self.bounded("motion_stopped", self.machine.motion_stopped()).await
    }

    /// Loads and stop-cycle state, all queries in flight at once, so a hung
    /// controller costs one query timeout.
    pub async fn poll_status(&self, t: f64) -> MachineStatus {
        let (loads, stopped) = tokio::join!(self.load_sample(t), self.motion_stopped());
        MachineStatus {
            loads,
            motion_stopped: matches!(stopped, Ok(true)),
        }
    }

    /// Poll until a cycle is running. `false` if cancelled first.
    pub async fn wait_for_cycle_start(&self, poll: Duration, cancel: &CancellationToken) -> bool {
        info!(machine = self.machine_name(), "Waiting for cycle start");
        loop {
            if let Ok(true) = self.cycle_active().await {
                info!("Cycle started");
                return true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// Read spindle speed and depth of cut if the tool is inside the measurement span.
    ///
    /// `Ok(None)` when the tool is near a stock edge.
    pub async fn measure_lobe_point(
        &self,
        geometry: &WorkpieceGeometry,
    ) -> Result<Option<LobePoint>, MachineQueryError> {
        let x = self.axis_position(Axis::X).await?;
        if !geometry.in_bounds(x) {
            debug!(x, "Tool outside measurement span");
            return Ok(None);
        }
        let rpm = self.spindle_rpm().await?;
        let position = match geometry.depth_axis() {
            Axis::X => x,
            axis => self.axis_position(axis).await?,
        };
        Ok(Some(LobePoint::new(rpm, geometry.depth_of_cut(position))))
    }
}
