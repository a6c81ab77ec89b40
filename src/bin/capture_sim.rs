//! Accelerometer Capture Simulation
//!
//! Writes a synthetic two-axis spindle acceleration capture for offline
//! analysis with `chatterscope analyze`:
//! - Stable cutting: spindle harmonics plus sensor noise
//! - Chattering cut: a non-synchronous vibration growing in part way through
//!
//! # Usage
//! ```bash
//! ./capture-sim --rpm 3000 --seconds 3 --chatter --out cut.csv
//! chatterscope analyze --csv cut.csv --rpm 3000
//! ```

use clap::Parser;
use std::path::PathBuf;

use chatterscope::acquisition::{ChatterOnset, SyntheticCut};
use chatterscope::config::defaults::SAMPLE_RATE_HZ;
use chatterscope::storage::Capture;
use chatterscope::types::Sample;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "capture-sim")]
#[command(about = "Synthetic accelerometer capture for chatterscope testing")]
#[command(version = "1.0")]
struct Args {
    /// Spindle speed
    #[arg(long, default_value = "3000")]
    rpm: f64,

    /// Capture length in seconds
    #[arg(long, default_value = "3.0")]
    seconds: f64,

    /// Sample rate in Hz
    #[arg(long, default_value_t = SAMPLE_RATE_HZ)]
    sample_rate: f64,

    /// Add chatter developing part way through the capture
    #[arg(long)]
    chatter: bool,

    /// Chatter onset time (seconds)
    #[arg(long, default_value = "1.5")]
    onset: f64,

    /// Chatter frequency (Hz)
    #[arg(long, default_value = "437.3")]
    chatter_hz: f64,

    /// Random seed for reproducibility
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Output CSV
    #[arg(short, long, default_value = "capture.csv")]
    out: PathBuf,

    /// Suppress the summary on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if !(args.rpm > 0.0 && args.seconds > 0.0 && args.sample_rate > 0.0) {
        return Err("rpm, seconds and sample rate must be positive".into());
    }

    let mut cut = if args.chatter {
        let onset = ChatterOnset {
            onset_seconds: args.onset,
            frequency_hz: args.chatter_hz,
            ..ChatterOnset::default()
        };
        SyntheticCut::chattering(args.rpm, onset, args.seed)
    } else {
        SyntheticCut::stable(args.rpm, args.seed)
    };

    let count = (args.seconds * args.sample_rate).round() as usize;
    let samples: Vec<Sample> = cut
        .generate(0, count, args.sample_rate)
        .into_iter()
        .enumerate()
        .map(|(i, (ax, ay))| Sample::new(i as f64 / args.sample_rate, ax, ay))
        .collect();

    Capture::new(samples).write_csv(&args.out, None)?;

    if !args.quiet {
        eprintln!("{}", "=".repeat(60));
        eprintln!("CAPTURE SIMULATION");
        eprintln!("  Spindle:     {:.0} rpm ({:.2} Hz)", args.rpm, args.rpm / 60.0);
        eprintln!("  Samples:     {} at {} Hz", count, args.sample_rate);
        if args.chatter {
            eprintln!("  Chatter:     {} Hz from {} s", args.chatter_hz, args.onset);
        } else {
            eprintln!("  Chatter:     none");
        }
        eprintln!("  Output:      {}", args.out.display());
        eprintln!("{}", "=".repeat(60));
    }
    Ok(())
}
