//! Engine settings: transport and executor configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use cardplay_core::{Budget, CaptureConfig, ExecutorConfig, OverflowPolicy, Tick, TransportState};

use crate::error::ConfigError;

/// Transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Tempo in beats per minute.
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    /// Ticks per quarter note.
    #[serde(default = "default_ppq")]
    pub ppq: u32,
    /// Audio sample rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_bpm() -> f64 {
    120.0
}

fn default_ppq() -> u32 {
    96
}

fn default_sample_rate() -> u32 {
    48000
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            ppq: default_ppq(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Executor settings. Unset limits mean "unlimited"; unset capacity
/// disables event capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Split each window into batches of this many ticks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_ticks: Option<Tick>,
    /// Node invocations allowed per evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_invocations: Option<u64>,
    /// Wall-clock milliseconds allowed per evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wall_ms: Option<u64>,
    /// Capacity of the event capture queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_capacity: Option<usize>,
    /// What the capture queue does when full.
    #[serde(default)]
    pub overflow: OverflowPolicy,
    /// Record one entry per node invocation.
    #[serde(default)]
    pub processor_log: bool,
}

/// Engine settings, stored standalone or as the `[engine]` table of a
/// project.
///
/// # TOML Format
///
/// ```toml
/// [transport]
/// bpm = 128.0
/// ppq = 96
/// sample_rate = 48000
///
/// [executor]
/// batch_ticks = 24
/// capture_capacity = 4096
/// overflow = "drop-oldest"
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Transport settings.
    #[serde(default)]
    pub transport: TransportSettings,
    /// Executor settings.
    #[serde(default)]
    pub executor: ExecutorSettings,
}

impl EngineSettings {
    /// Transport at tick 0 in the default mode.
    pub fn transport_state(&self) -> TransportState {
        TransportState::new(self.transport.bpm, self.transport.ppq).with_sample_rate(self.transport.sample_rate)
    }

    /// Executor configuration.
    pub fn executor_config(&self) -> ExecutorConfig {
        let executor = &self.executor;
        ExecutorConfig {
            batch_ticks: executor.batch_ticks,
            budget: Budget {
                max_invocations: executor.max_invocations,
                max_wall_ms: executor.max_wall_ms,
            },
            capture: executor.capture_capacity.map(|capacity| CaptureConfig {
                capacity,
                overflow: executor.overflow,
            }),
            processor_log: executor.processor_log,
        }
    }

    /// Load settings from a TOML file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse settings from a TOML string and validate them.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let settings: EngineSettings = toml::from_str(toml_str)?;
        crate::validation::validate_settings(&settings)?;
        Ok(settings)
    }

    /// Save settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Convert the settings to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_transport_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.transport_state(), TransportState::default());
        assert_eq!(settings.executor_config(), ExecutorConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineSettings::from_toml("").unwrap(), EngineSettings::default());
    }

    #[test]
    fn test_executor_config_mapping() {
        let settings = EngineSettings::from_toml(
            r#"
            [transport]
            bpm = 90.0

            [executor]
            batch_ticks = 24
            max_invocations = 500
            capture_capacity = 16
            overflow = "drop-newest"
            processor_log = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.transport.bpm, 90.0);
        assert_eq!(settings.transport.ppq, 96);
        let config = settings.executor_config();
        assert_eq!(config.batch_ticks, Some(24));
        assert_eq!(config.budget.max_invocations, Some(500));
        assert_eq!(config.budget.max_wall_ms, None);
        assert_eq!(
            config.capture,
            Some(CaptureConfig {
                capacity: 16,
                overflow: OverflowPolicy::DropNewest,
            })
        );
        assert!(config.processor_log);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = EngineSettings::from_toml("[transport]\nppq = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "got: {err}");
        assert!(err.to_string().contains("transport.ppq"), "got: {err}");
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut settings = EngineSettings::default();
        settings.executor.batch_ticks = Some(12);
        settings.executor.overflow = OverflowPolicy::Clip;
        let text = settings.to_toml().unwrap();
        assert!(text.contains("overflow = \"clip\""), "got: {text}");
        assert_eq!(EngineSettings::from_toml(&text).unwrap(), settings);
    }
}
