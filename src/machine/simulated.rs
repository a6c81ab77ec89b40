//! Simulated machine controller for offline sessions and tests

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{Axis, MachineQueryError, MachineState};

#[derive(Debug, Clone)]
struct SimState {
    rpm: f64,
    spindle_load: f64,
    x_start_mm: f64,
    feed_mm_per_s: f64,
    z_mm: f64,
    started: Instant,
    stop_after: Option<Duration>,
    failing: bool,
    latency: Duration,
}

/// A machine feeding along X at constant speed from a start position.
///
/// The cut starts when the simulator is created and motion stops after
/// `stop_after`, if set.
#[derive(Debug)]
pub struct SimulatedMachine {
    state: Mutex<SimState>,
}

impl SimulatedMachine {
    pub fn new(rpm: f64) -> Self {
        Self {
            state: Mutex::new(SimState {
                rpm,
                spindle_load: 12.0,
                x_start_mm: 0.0,
                feed_mm_per_s: 0.0,
                z_mm: 0.0,
                started: Instant::now(),
                stop_after: None,
                failing: false,
                latency: Duration::ZERO,
            }),
        }
    }

    fn update(self, f: impl FnOnce(&mut SimState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    pub fn with_feed(self, x_start_mm: f64, feed_mm_per_s: f64) -> Self {
        self.update(|s| {
            s.x_start_mm = x_start_mm;
            s.feed_mm_per_s = feed_mm_per_s;
        })
    }

    pub fn with_z(self, z_mm: f64) -> Self {
        self.update(|s| s.z_mm = z_mm)
    }

    pub fn stop_after(self, duration: Duration) -> Self {
        self.update(|s| s.stop_after = Some(duration))
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.update(|s| s.latency = latency)
    }

    pub fn failing(self, failing: bool) -> Self {
        self.update(|s| s.failing = failing)
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.failing = failing;
        }
    }

    fn snapshot(&self) -> Result<SimState, MachineQueryError> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|_| MachineQueryError::Unavailable("simulator state poisoned".to_string()))
    }

    async fn query<T>(&self, read: impl FnOnce(&SimState) -> T) -> Result<T, MachineQueryError> {
        let state = self.snapshot()?;
        if !state.latency.is_zero() {
            tokio::time::sleep(state.latency).await;
        }
        if state.failing {
            return Err(MachineQueryError::Unavailable("simulated controller offline".to_string()));
        }
        Ok(read(&state))
    }
}

impl SimState {
    fn elapsed(&self) -> Duration {
        let elapsed = self.started.elapsed();
        self.stop_after.map_or(elapsed, |stop| elapsed.min(stop))
    }

    fn stopped(&self) -> bool {
        self.stop_after.is_some_and(|stop| self.started.elapsed() >= stop)
    }
}

#[async_trait]
impl MachineState for SimulatedMachine {
    async fn spindle_rpm(&self) -> Result<f64, MachineQueryError> {
        self.query(|s| s.rpm).await
    }

    async fn spindle_load(&self) -> Result<f64, MachineQueryError> {
        self.query(|s| if s.stopped() { 0.0 } else { s.spindle_load }).await
    }

    async fn axis_load(&self, axis: Axis) -> Result<f64, MachineQueryError> {
        self.query(|s| match (axis, s.stopped()) {
            (_, true) => 0.0,
            (Axis::X, false) => 4.0 + s.feed_mm_per_s.abs(),
            (Axis::Y, false) => 2.0,
            (Axis::Z, false) => 3.0,
        })
        .await
    }

    async fn axis_position(&self, axis: Axis) -> Result<f64, MachineQueryError> {
        self.query(|s| match axis {
            Axis::X => s.x_start_mm + s.feed_mm_per_s * s.elapsed().as_secs_f64(),
            Axis::Y => 0.0,
            Axis::Z => s.z_mm,
        })
        .await
    }

    async fn cycle_active(&self) -> Result<bool, MachineQueryError> {
        self.query(|s| !s.stopped() && s.rpm > 0.0).await
    }

    async fn motion_stopped(&self) -> Result<bool, MachineQueryError> {
        self.query(SimState::stopped).await
    }

    fn machine_name(&self) -> &str {
        "simulated-mill"
    }
}
