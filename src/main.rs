//! Chatterscope - machine-tool chatter detection
//!
//! Detects regenerative chatter in biaxial spindle acceleration and fits
//! stability-lobe curves from the chatter onsets it records.
//!
//! # Usage
//!
//! ```bash
//! # Analyse a recorded capture and merge the indicator into a copy of it
//! chatterscope analyze --csv capture.csv --rpm 3000 --merge
//!
//! # One recording session against the simulated DAQ and machine
//! chatterscope record --rpm 3000 --seconds 3 --chatter
//!
//! # Collect lobe points until the fit has enough data, then fit
//! chatterscope calibrate --points 8
//!
//! # Refit from a saved point file
//! chatterscope fit --points-csv chatterscope_data/lobe_points_03_07_09_05.csv
//! ```
//!
//! # Environment Variables
//!
//! - `CHATTERSCOPE_CONFIG`: Path to the TOML configuration file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chatterscope::acquisition::{ChatterOnset, DaqSource, SimulatedDaq, SyntheticCut};
use chatterscope::config::{self, ChatterConfig};
use chatterscope::config::defaults::MM_PER_INCH;
use chatterscope::lobe::{stability_limit, FitOptions, LobeFitter, LobeModel, PARAMETER_COUNT, PARAMETER_NAMES};
use chatterscope::machine::{MachineMonitor, SimulatedMachine};
use chatterscope::pipeline::{analyze_capture, CalibrationSession, ProcessingLoop, SessionReport, WindowPlan};
use chatterscope::processing::{FilterDesigner, WindowAnalyzer};
use chatterscope::storage::{self, Capture, ColumnLayout};
use chatterscope::types::{CutGeometry, LobePoint};

/// Lobe the simulated calibration cuts chatter on.
const SIMULATED_LOBE: [f64; PARAMETER_COUNT] = [1.0, -1.0, 0.0, 0.0, 0.0, -8_410_000.0, -290.0];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "chatterscope")]
#[command(about = "Machine-tool chatter detection and stability-lobe calibration")]
#[command(version)]
struct CliArgs {
    /// Configuration file (overrides CHATTERSCOPE_CONFIG and ./chatterscope.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Analyse a recorded capture file
    Analyze {
        /// Capture CSV
        #[arg(long)]
        csv: PathBuf,
        /// Spindle speed during the capture
        #[arg(long)]
        rpm: f64,
        /// Column order of the file, one letter per column (T, X, Y; others ignored)
        #[arg(long, default_value = "TXY")]
        columns: String,
        /// Sample rate; estimated from the file when omitted
        #[arg(long)]
        sample_rate: Option<f64>,
        /// Write a copy of the capture with a chatter_indicator column
        #[arg(long)]
        merge: bool,
        /// Destination of the merged capture (default: next to the input)
        #[arg(long, requires = "merge")]
        out: Option<PathBuf>,
    },

    /// Run one recording session against the simulated DAQ and machine
    Record {
        #[arg(long)]
        rpm: f64,
        /// Cut length
        #[arg(long, default_value = "3.0")]
        seconds: f64,
        /// Simulate chatter developing part way through the cut
        #[arg(long)]
        chatter: bool,
        /// Pace the DAQ at the configured batch period
        #[arg(long)]
        realtime: bool,
        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// Record cuts at increasing spindle speed until enough lobe points exist, then fit
    Calibrate {
        /// Lobe points to collect (default: calibration.points)
        #[arg(long)]
        points: Option<usize>,
        #[arg(long, default_value = "2950")]
        start_rpm: f64,
        #[arg(long, default_value = "50")]
        rpm_step: f64,
        #[arg(long, default_value = "3.0")]
        seconds: f64,
        #[arg(long, default_value = "1")]
        seed: u64,
    },

    /// Fit a stability-lobe model to a saved lobe-point file
    Fit {
        #[arg(long)]
        points_csv: PathBuf,
    },

    /// Write the active configuration as TOML
    InitConfig {
        #[arg(long, default_value = "chatterscope.toml")]
        path: PathBuf,
    },
}

// ============================================================================
// Helpers
// ============================================================================

fn output_path(config: &ChatterConfig, prefix: &str, rpm: Option<f64>) -> PathBuf {
    let name = storage::timestamped_file_name(prefix, &chrono::Local::now(), rpm);
    config.calibration.output_dir.join(name)
}

fn merged_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("capture");
    input.with_file_name(format!("{stem}_chatter.csv"))
}

/// Persist a fitted model and its tabulated curve.
fn persist_model(config: &ChatterConfig, model: &LobeModel) -> Result<()> {
    let cal = &config.calibration;
    let constants = output_path(config, "lobe_constants", None);
    storage::write_lobe_constants(&constants, model).context("Failed to write lobe constants")?;

    let curve = model.curve(cal.curve_rpm_min, cal.curve_rpm_max, cal.curve_rpm_step);
    let curve_path = output_path(config, "lobe_curve", None);
    storage::write_lobe_points(&curve_path, &curve).context("Failed to write lobe curve")?;

    info!("📈 Stability lobe model:");
    for (name, value) in PARAMETER_NAMES.iter().zip(model.params) {
        info!("   {:<3} = {:e}", name, value);
    }
    info!("   residual = {:e} ({} points, {} iterations)", model.residual, model.points, model.iterations);
    Ok(())
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_analyze(
    config: &ChatterConfig,
    csv: &Path,
    rpm: f64,
    columns: &str,
    sample_rate: Option<f64>,
    merge_out: Option<PathBuf>,
) -> Result<()> {
    let layout = ColumnLayout::parse(columns).context("Invalid --columns")?;
    let capture = Capture::read_csv(csv, layout).with_context(|| format!("Failed to read {}", csv.display()))?;

    let rate = match sample_rate.or_else(|| capture.estimate_sample_rate()) {
        Some(rate) => rate,
        None => {
            warn!("Cannot estimate sample rate, using configured rate");
            config.acquisition.sample_rate_hz
        }
    };
    info!(rate_hz = rate, duration_s = capture.duration(), "Capture timing");

    let analyzer = WindowAnalyzer::from_config(&mut FilterDesigner::new(), config, rate, rpm)
        .context("Cannot build window analysis")?;
    let plan = WindowPlan::from_seconds(rate, config.analysis.window_seconds, config.analysis.step_seconds)?;
    let report = analyze_capture(&capture.samples, plan, &analyzer);

    println!("time,chatter_indicator");
    for reading in &report.readings {
        println!("{},{}", reading.t, reading.value);
    }

    let above = report
        .readings
        .iter()
        .filter(|r| r.value >= config.detection.threshold)
        .count();
    info!(
        readings = report.readings.len(),
        above_threshold = above,
        threshold = config.detection.threshold,
        skipped = %report.skips,
        "Analysis complete"
    );

    if let Some(out) = merge_out {
        capture
            .write_csv(&out, Some(&report.readings))
            .context("Failed to write merged capture")?;
    }
    Ok(())
}

/// One recording session against the simulated DAQ and machine.
async fn run_cut(
    config: &ChatterConfig,
    cut: SyntheticCut,
    machine: SimulatedMachine,
    seconds: f64,
    realtime: bool,
    cancel_token: &CancellationToken,
) -> Result<Option<SessionReport>> {
    let machine = Arc::new(machine);
    let monitor = MachineMonitor::new(machine, Duration::from_millis(config.machine.query_timeout_ms));
    let poll = Duration::from_millis(config.machine.poll_interval_ms);
    if !monitor.wait_for_cycle_start(poll, cancel_token).await {
        return Ok(None);
    }

    let daq = SimulatedDaq::new(cut, &config.acquisition)
        .with_duration(seconds)
        .realtime(realtime);
    let mut source = DaqSource::new(daq, &config.acquisition);
    let report = ProcessingLoop::new(config, monitor, cancel_token.child_token())
        .run(&mut source)
        .await
        .context("Recording session could not start")?;

    if let Some(capture) = &report.capture {
        let path = output_path(config, "capture", Some(report.rpm));
        capture
            .clone()
            .trim_settle(config.acquisition.settle_seconds)
            .detrend()
            .write_csv(&path, Some(&report.schedule.readings))
            .context("Failed to write capture")?;
    }
    Ok(Some(report))
}

/// Simulated machine feeding along the inclined stock, starting `fraction` of
/// the way through the measurement span.
fn simulated_machine(config: &ChatterConfig, rpm: f64, seconds: f64, fraction: f64) -> SimulatedMachine {
    let m = &config.machine;
    let span = m.material_length_mm - 2.0 * m.edge_margin_mm;
    let x_start = m.x_offset_mm + m.edge_margin_mm + span * fraction.clamp(0.0, 1.0);
    SimulatedMachine::new(rpm)
        .with_feed(x_start, 0.0)
        .stop_after(Duration::from_secs_f64(seconds.max(0.0) + 1.0))
}

/// Simulated machine positioned so the cut depth sits on [`SIMULATED_LOBE`].
fn simulated_machine_on_lobe(config: &ChatterConfig, rpm: f64, seconds: f64) -> SimulatedMachine {
    let m = &config.machine;
    let depth = stability_limit(rpm, &SIMULATED_LOBE);
    let depth_mm = if m.report_inches { depth * MM_PER_INCH } else { depth };
    let machine = simulated_machine(config, rpm, seconds, 0.5);
    match m.geometry {
        CutGeometry::Incline => {
            machine.with_feed(m.x_offset_mm + depth_mm / m.incline_deg.to_radians().tan(), 0.0)
        }
        CutGeometry::Flat => machine.with_z(m.z_offset_mm + depth_mm),
    }
}

async fn run_record(
    config: &ChatterConfig,
    rpm: f64,
    seconds: f64,
    chatter: bool,
    realtime: bool,
    seed: u64,
    cancel_token: CancellationToken,
) -> Result<()> {
    let cut = if chatter {
        SyntheticCut::chattering(rpm, ChatterOnset::default(), seed)
    } else {
        SyntheticCut::stable(rpm, seed)
    };
    let machine = simulated_machine(config, rpm, seconds, 0.5);
    let Some(report) = run_cut(config, cut, machine, seconds, realtime, &cancel_token).await? else {
        info!("Cancelled before the cycle started");
        return Ok(());
    };

    if !report.lobe_points.is_empty() {
        let path = output_path(config, "lobe_points", Some(rpm));
        storage::write_lobe_points(&path, &report.lobe_points).context("Failed to write lobe points")?;
    }
    Ok(())
}

async fn run_calibrate(
    config: &ChatterConfig,
    points: usize,
    start_rpm: f64,
    rpm_step: f64,
    seconds: f64,
    seed: u64,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut session = CalibrationSession::new(points);
    // Cuts that record nothing move on to the next speed
    let max_cuts = points.saturating_mul(3).max(1);

    while !session.is_complete() && session.cuts() < max_cuts && !cancel_token.is_cancelled() {
        let k = session.cuts();
        let rpm = start_rpm + rpm_step * k as f64;
        let cut = SyntheticCut::chattering(rpm, ChatterOnset::default(), seed.wrapping_add(k as u64));
        let machine = simulated_machine_on_lobe(config, rpm, seconds);

        match run_cut(config, cut, machine, seconds, false, &cancel_token).await? {
            Some(report) => session.record_cut(&report),
            None => break,
        }
    }

    let points_path = output_path(config, "lobe_points", None);
    storage::write_lobe_points(&points_path, session.points()).context("Failed to write lobe points")?;
    if !session.is_complete() {
        anyhow::bail!(
            "calibration stopped after {} cuts with {} of {} lobe points",
            session.cuts(),
            session.points().len(),
            points
        );
    }

    let fitter = LobeFitter::new(FitOptions::from_config(&config.calibration));
    let model = session.fit(&fitter).context("Stability lobe fit failed")?;
    persist_model(config, &model)
}

fn run_fit(config: &ChatterConfig, points_csv: &Path) -> Result<()> {
    let points: Vec<LobePoint> = storage::read_lobe_points(points_csv)
        .with_context(|| format!("Failed to read {}", points_csv.display()))?;
    info!(points = points.len(), "Fitting stability lobe");

    let fitter = LobeFitter::new(FitOptions::from_config(&config.calibration));
    let model = fitter.fit(&points).context("Stability lobe fit failed")?;
    persist_model(config, &model)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let chatter_config = match &args.config {
        Some(path) => ChatterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ChatterConfig::load(),
    };
    config::init(chatter_config);
    let config = config::get();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Chatterscope - Machine-Tool Chatter Detection");
    info!(
        "  {:.0} Hz | window {} s / step {} s | {} | threshold {}",
        config.acquisition.sample_rate_hz,
        config.analysis.window_seconds,
        config.analysis.step_seconds,
        config.analysis.indicator,
        config.detection.threshold
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    match args.command {
        SubCommand::Analyze {
            csv,
            rpm,
            columns,
            sample_rate,
            merge,
            out,
        } => {
            let merge_out = merge.then(|| out.unwrap_or_else(|| merged_path(&csv)));
            run_analyze(config, &csv, rpm, &columns, sample_rate, merge_out)?;
        }
        SubCommand::Record {
            rpm,
            seconds,
            chatter,
            realtime,
            seed,
        } => run_record(config, rpm, seconds, chatter, realtime, seed, cancel_token).await?,
        SubCommand::Calibrate {
            points,
            start_rpm,
            rpm_step,
            seconds,
            seed,
        } => {
            let points = points.unwrap_or(config.calibration.points);
            run_calibrate(config, points, start_rpm, rpm_step, seconds, seed, cancel_token).await?;
        }
        SubCommand::Fit { points_csv } => run_fit(config, &points_csv)?,
        SubCommand::InitConfig { path } => {
            config.save_to_file(&path).context("Failed to write config")?;
        }
    }

    info!("");
    info!("✓ Chatterscope finished");
    Ok(())
}
