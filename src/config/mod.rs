//! Chatterscope Configuration Module
//!
//! Acquisition, filtering, windowing, detection, machine geometry and
//! calibration settings loaded from a single TOML document.
//!
//! ## Loading Order
//!
//! 1. `CHATTERSCOPE_CONFIG` environment variable (path to TOML file)
//! 2. `chatterscope.toml` in the current working directory
//! 3. Built-in defaults (the values the machine was commissioned with)
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(ChatterConfig::load());
//!
//! // Anywhere in the codebase:
//! let threshold = config::get().detection.threshold;
//! ```

mod chatter_config;
pub mod defaults;
pub mod validation;

pub use chatter_config::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static CHATTER_CONFIG: OnceLock<ChatterConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: ChatterConfig) {
    if CHATTER_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global configuration.
///
/// Falls back to built-in defaults if `init()` was never called.
pub fn get() -> &'static ChatterConfig {
    CHATTER_CONFIG.get_or_init(|| {
        tracing::warn!("config::get() before config::init(), using built-in defaults");
        ChatterConfig::default()
    })
}
