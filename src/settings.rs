use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use log::warn;

/// Accelerometer pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VibrationConfig {
    /// Low-pass coefficient for the per-axis gravity estimate, in (0, 1).
    pub smoothing_factor: f64,
    /// Number of |z| samples in the sliding RMS window.
    pub window_size: usize,
    /// Bounded roughness history kept for charting.
    pub history_capacity: usize,
    /// Nominal producer cadence. Informational.
    pub sample_rate_hz: u32,
}

impl Default for VibrationConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.15,
            window_size: 20,
            history_capacity: 150,
            sample_rate_hz: 50,
        }
    }
}

/// GPS jitter rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DistanceConfig {
    /// Moves shorter than this do not add distance.
    pub min_step_m: f64,
    /// Fixes with a worse horizontal accuracy do not add distance.
    pub max_accuracy_m: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            min_step_m: 0.5,
            max_accuracy_m: 25.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlushConfig {
    pub max_batch: usize,
    pub max_interval_ms: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            max_batch: 10,
            max_interval_ms: 2000,
        }
    }
}

/// Ascending roughness thresholds (g) separating the four condition labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConditionThresholds {
    pub fair: f64,
    pub lightly_damaged: f64,
    pub severely_damaged: f64,
}

impl Default for ConditionThresholds {
    fn default() -> Self {
        Self {
            fair: 0.3,
            lightly_damaged: 0.6,
            severely_damaged: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub sdi_segment_length_m: f64,
    /// ASTM D6433 sample unit. 232 m² by default; the 50 m x 3.7 m lane
    /// variant is 185 m².
    pub pci_sample_area_m2: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sdi_segment_length_m: 100.0,
            pci_sample_area_m2: 232.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub vibration: VibrationConfig,
    pub distance: DistanceConfig,
    pub flush: FlushConfig,
    pub thresholds: ConditionThresholds,
    pub indices: IndexConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let alpha = self.vibration.smoothing_factor;
        if !(alpha > 0.0 && alpha < 1.0) {
            bail!("smoothing_factor must be in (0, 1), got {alpha}");
        }
        if self.vibration.window_size == 0 {
            bail!("window_size must be greater than zero");
        }
        if self.vibration.history_capacity == 0 {
            bail!("history_capacity must be greater than zero");
        }
        if self.flush.max_batch == 0 {
            bail!("flush max_batch must be greater than zero");
        }
        let t = &self.thresholds;
        if !(t.fair < t.lightly_damaged && t.lightly_damaged < t.severely_damaged) {
            bail!(
                "condition thresholds must ascend, got {} / {} / {}",
                t.fair,
                t.lightly_damaged,
                t.severely_damaged
            );
        }
        Ok(())
    }
}

/// JSON-backed engine settings.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineConfig>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                EngineConfig::default()
            })
        } else {
            EngineConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn config(&self) -> EngineConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: EngineConfig = serde_json::from_str(&contents)?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &EngineConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
