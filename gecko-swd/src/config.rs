// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Session configuration
//!
//! Every delay and polling budget used by `gecko-swd` lives in [`Timing`].
//! The defaults are the values known to work with slow serial adapters.
//! [`Timing::immediate()`] removes all delays, for simulated targets.
//!
//! Both types deserialize with missing fields taking their defaults:
//!
//! ```rust
//! use gecko_swd::Config;
//!
//! let config: Config = serde_json::from_str(r#"{"timing": {"settle_ms": 10}}"#).unwrap();
//! assert_eq!(config.timing.settle_ms, 10);
//! assert_eq!(config.timing.reset_polls, 1000);
//! ```

use embassy_time::{Duration, block_for};
use serde::{Deserialize, Serialize};

/// Delays and polling budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Settle time around reset-and-halt, in milliseconds
    pub settle_ms: u64,

    /// Pause before each DRW write in a block write, in microseconds
    pub block_write_pacing_us: u64,

    /// Pause before each DRW write in a half-word write, in microseconds
    pub half_word_pacing_us: u64,

    /// DHCSR reads waiting for S_RESET_ST to clear
    pub reset_polls: u32,

    /// DHCSR reads waiting for S_REGRDY
    pub register_ready_polls: u32,

    /// MSC_STATUS reads waiting for BUSY to clear
    pub flash_busy_polls: u32,

    /// Status word reads waiting for the flash loader to report ready
    pub loader_ready_polls: u32,

    /// Status word reads waiting for one flash loader request to complete
    pub loader_request_polls: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_ms: 100,
            block_write_pacing_us: 10_000,
            half_word_pacing_us: 1_000,
            reset_polls: 1000,
            register_ready_polls: 1000,
            flash_busy_polls: 100_000,
            loader_ready_polls: 1000,
            loader_request_polls: 1_000_000,
        }
    }
}

impl Timing {
    /// Default poll budgets with every delay removed.
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            block_write_pacing_us: 0,
            half_word_pacing_us: 0,
            ..Self::default()
        }
    }

    pub fn settle(&self) {
        pause(Duration::from_millis(self.settle_ms));
    }

    pub fn block_write_pacing(&self) {
        pause(Duration::from_micros(self.block_write_pacing_us));
    }

    pub fn half_word_pacing(&self) {
        pause(Duration::from_micros(self.half_word_pacing_us));
    }
}

// Blocks the calling thread.  Zero length pauses do nothing.
fn pause(duration: Duration) {
    if duration.as_ticks() > 0 {
        block_for(duration);
    }
}

/// Session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index of the MEM-AP giving access to the system bus
    pub ap_index: u8,

    pub timing: Timing,
}

impl Config {
    /// Configuration with no delays, for simulated targets.
    pub fn immediate() -> Self {
        Self {
            timing: Timing::immediate(),
            ..Self::default()
        }
    }
}
