//! Configuration system for Cadence.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CADENCE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/cadence/config.toml
//!   3. ~/.config/cadence/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub engine: EngineConfig,
    pub generator: GeneratorConfig,
    pub stats: StatsConfig,
}

/// Pacing engine geometry and tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Slow-tier ring capacity in slots. Must be a power of two.
    pub slow_capacity: usize,
    /// Fast-tier ring capacity in slots. Must be a multiple of 64 and no
    /// larger than the slow tier.
    pub fast_capacity: usize,
    /// How far ahead of the wheel head the tier synchronizer keeps the fast
    /// tier populated. Multiple of 8, less than `fast_capacity`.
    pub sync_lead: usize,
    /// log2 of ticks per slot. 5 ⇒ 32 ticks per slot.
    pub slot_shift: u32,
    /// Maximum scheduling distance in slots. Departures further out are
    /// clamped to this boundary.
    pub horizon_slots: u64,
    /// Slot-allocator probe bound in 64-bit bitmap words.
    pub probe_words: usize,
    /// Ticks of inter-packet gap per unit of rate code.
    pub rate_gap_scale: u64,
    /// Flow-id space. Power of two, at most 16 (the field is 4 bits).
    pub flows: usize,
    /// Destination sequencer count. Power of two.
    pub sequencers: usize,
    /// Worker lanes admitting upstream batches.
    pub lanes: usize,
    /// Lanes running the sync + dequeue side.
    pub pump_lanes: usize,
    /// Tick resolution in nanoseconds.
    pub tick_ns: u64,
    /// Halt on malformed descriptors (zero payload handle, reserved bits).
    pub debug_checks: bool,
}

/// Built-in load generator (the daemon's upstream producer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of flows to spread traffic across.
    pub flows: u8,
    /// Rate code stamped on every generated packet.
    pub rate_code: u16,
    /// Destination queues to cycle through.
    pub destinations: u8,
    /// Batches to produce. 0 = run until shutdown.
    pub batches: u64,
    /// Microseconds between produced batches.
    pub batch_interval_us: u64,
    /// Produce one segmented burst every N batches. 0 = never.
    pub segmented_every: u64,
    /// Segments per segmented burst.
    pub segments_per_burst: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Seconds between stats log lines. 0 = disabled.
    pub interval_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            generator: GeneratorConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slow_capacity: 4096,
            fast_capacity: 192,
            sync_lead: 128,
            slot_shift: 5,
            horizon_slots: 3072,
            probe_words: 5,
            rate_gap_scale: 12,
            flows: 16,
            sequencers: 16,
            lanes: 2,
            pump_lanes: 2,
            tick_ns: 20,
            debug_checks: true,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            flows: 4,
            rate_code: 250,
            destinations: 4,
            batches: 0,
            batch_interval_us: 100,
            segmented_every: 0,
            segments_per_burst: 4,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Reject geometries the engine cannot run on. Called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Invalid(msg));

        if !self.slow_capacity.is_power_of_two() {
            return fail(format!(
                "slow_capacity must be a power of two, got {}",
                self.slow_capacity
            ));
        }
        if self.fast_capacity == 0 || self.fast_capacity % 64 != 0 {
            return fail(format!(
                "fast_capacity must be a non-zero multiple of 64, got {}",
                self.fast_capacity
            ));
        }
        if self.fast_capacity > self.slow_capacity {
            return fail("fast_capacity exceeds slow_capacity".into());
        }
        if self.sync_lead == 0 || self.sync_lead % 8 != 0 || self.sync_lead >= self.fast_capacity {
            return fail(format!(
                "sync_lead must be a multiple of 8 below fast_capacity, got {}",
                self.sync_lead
            ));
        }
        if self.probe_words == 0 || self.probe_words > self.slow_capacity / 64 {
            return fail(format!(
                "probe_words must be in 1..={}, got {}",
                self.slow_capacity / 64,
                self.probe_words
            ));
        }
        if self.horizon_slots as usize >= self.slow_capacity {
            return fail("horizon_slots must be below slow_capacity".into());
        }
        if !self.flows.is_power_of_two() || self.flows > 16 {
            return fail(format!(
                "flows must be a power of two ≤ 16, got {}",
                self.flows
            ));
        }
        if !self.sequencers.is_power_of_two() {
            return fail("sequencers must be a power of two".into());
        }
        if self.lanes == 0 || self.pump_lanes == 0 {
            return fail("lanes and pump_lanes must be non-zero".into());
        }
        if self.slot_shift >= 32 {
            return fail("slot_shift out of range".into());
        }
        if self.tick_ns == 0 {
            return fail("tick_ns must be non-zero".into());
        }
        Ok(())
    }
}

// ── Path helpers ─────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("cadence")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl CadenceConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            CadenceConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CADENCE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CadenceConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CADENCE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CADENCE_ENGINE__LANES") {
            if let Ok(n) = v.parse() {
                self.engine.lanes = n;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_ENGINE__PUMP_LANES") {
            if let Ok(n) = v.parse() {
                self.engine.pump_lanes = n;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_ENGINE__PROBE_WORDS") {
            if let Ok(n) = v.parse() {
                self.engine.probe_words = n;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_ENGINE__DEBUG_CHECKS") {
            self.engine.debug_checks = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("CADENCE_GENERATOR__RATE_CODE") {
            if let Ok(n) = v.parse() {
                self.generator.rate_code = n;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_GENERATOR__BATCHES") {
            if let Ok(n) = v.parse() {
                self.generator.batches = n;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_STATS__INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.stats.interval_secs = n;
            }
        }
    }
}
