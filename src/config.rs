//! Configuration for the Leap Gesture Agent.

use crate::core::continuity::RefreshPolicy;
use crate::core::keys::Hand;
use crate::core::motion::MotionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor services to connect to
    pub devices: Vec<DeviceConfig>,

    /// Directory holding the parameter files (VoI lists, vocabulary, statistics)
    pub params_dir: PathBuf,

    /// Classifier settings
    pub model: ModelConfig,

    /// Frame pipeline settings
    pub pipeline: PipelineConfig,

    /// Indicator smoothing
    pub motion: MotionSettings,

    /// Connection handling
    pub transport: TransportConfig,

    /// Console output
    pub presenter: PresenterConfig,

    /// Path for recordings
    pub export_path: PathBuf,

    /// Path for persisted statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leap-gesture-agent");

        Self {
            devices: vec![DeviceConfig::default()],
            params_dir: PathBuf::from("params"),
            model: ModelConfig::default(),
            pipeline: PipelineConfig::default(),
            motion: MotionSettings::default(),
            transport: TransportConfig::default(),
            presenter: PresenterConfig::default(),
            export_path: data_dir.join("recordings"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Io(format!("{config_path:?}: {e}")))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(format!("{config_path:?}: {e}")))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`, or the default location when `None`.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(config_path)
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("leap-gesture-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Range checks that do not need the parameter files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid("at least one device is required".into()));
        }
        if self.model.sequence_length == 0 {
            return Err(ConfigError::Invalid("model.sequence_length must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.model.min_probability) {
            return Err(ConfigError::Invalid(
                "model.min_probability must lie in [0, 1]".into(),
            ));
        }
        if self.pipeline.frame_stride == 0 {
            return Err(ConfigError::Invalid("pipeline.frame_stride must be positive".into()));
        }
        self.motion.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

/// A single sensor service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// WebSocket URL of the tracking service
    pub url: String,
    /// Tracking mode requested on connect
    pub mode: DeviceMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:6437/v6.json".to_string(),
            mode: DeviceMode::Desktop,
        }
    }
}

/// Sensor placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    /// Sensor lying on the desk, facing up
    #[default]
    Desktop,
    /// Sensor mounted on a headset
    Hmd,
}

impl DeviceMode {
    /// Value of the `optimizeHMD` flag sent on connect.
    pub fn optimize_hmd(&self) -> bool {
        matches!(self, DeviceMode::Hmd)
    }

    /// Value stored under `device_mode` in unpacked frames.
    pub fn code(&self) -> f64 {
        match self {
            DeviceMode::Desktop => 0.0,
            DeviceMode::Hmd => 1.0,
        }
    }
}

/// Classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX model file; without one the agent runs indicators only
    pub path: Option<PathBuf>,
    /// Frames per classifier input
    pub sequence_length: usize,
    /// Resolved frames between predictions (0 = sequence length)
    pub prediction_interval: u64,
    /// Top probability needed before a gesture is reported
    pub min_probability: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            sequence_length: 40,
            prediction_interval: 0,
            min_probability: 0.5,
        }
    }
}

/// Frame pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hands every resolved frame must carry
    pub hands: HandsMode,
    /// When the stored previous frame is replaced
    pub refresh_policy: RefreshPolicy,
    /// Process every nth received frame
    pub frame_stride: u32,
    /// How long to wait for the first complete frame
    #[serde(with = "duration_millis")]
    pub schema_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hands: HandsMode::Both,
            refresh_policy: RefreshPolicy::CompleteOnly,
            frame_stride: 4,
            schema_timeout: Duration::from_secs(30),
        }
    }
}

/// Hands the classifier was trained on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandsMode {
    #[default]
    Both,
    Left,
    Right,
}

impl HandsMode {
    pub fn hands(&self) -> Vec<Hand> {
        match self {
            HandsMode::Both => Hand::BOTH.to_vec(),
            HandsMode::Left => vec![Hand::Left],
            HandsMode::Right => vec![Hand::Right],
        }
    }

    /// Parse a command line value (`both`, `left`, `right`).
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "both" | "all" => Some(HandsMode::Both),
            "left" => Some(HandsMode::Left),
            "right" => Some(HandsMode::Right),
            _ => None,
        }
    }
}

/// Connection handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// A read that blocks longer than this counts as a lost connection
    #[serde(with = "duration_millis")]
    pub read_timeout: Duration,
    /// First reconnection delay
    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,
    /// Upper bound on the reconnection delay
    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,
    /// Reconnection attempts before a device is left offline (0 = unlimited)
    pub max_attempts: u32,
    /// Capacity of the channel between device workers and the tick loop
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            max_attempts: 10,
            channel_capacity: 1_024,
        }
    }
}

/// Console output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenterConfig {
    /// Ticks between indicator lines
    pub print_interval: u64,
    /// Samples kept per indicator for charting
    pub history_length: usize,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            print_interval: 10,
            history_length: 200,
        }
    }
}

/// Configuration errors. All of them stop the agent before the tick loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Parameter error: {0}")]
    Params(String),
    #[error("No {which} recorded for feature '{key}'")]
    MissingStatistic { key: String, which: &'static str },
    #[error("Unusable statistics for feature '{key}' (mean {mean}, std {std})")]
    BadStatistic { key: String, mean: f64, std: f64 },
    #[error("Model expects {model} features per frame, parameters produce {schema}")]
    FeatureCount { model: usize, schema: usize },
    #[error("First complete frame does not match the configured features: {0:?}")]
    SchemaMismatch(Vec<String>),
    #[error("No complete frame within {0:?}")]
    SchemaTimeout(Duration),
    #[error("Model error: {0}")]
    Model(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].mode, DeviceMode::Desktop);
        assert_eq!(config.pipeline.hands, HandsMode::Both);
        assert_eq!(config.transport.read_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{
            "devices": [{"url": "ws://10.0.0.2:6437/v6.json", "mode": "hmd"}],
            "pipeline": {"hands": "right", "schema_timeout": 5000}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert!(config.devices[0].mode.optimize_hmd());
        assert_eq!(config.pipeline.hands.hands(), vec![Hand::Right]);
        assert_eq!(config.pipeline.schema_timeout, Duration::from_secs(5));
        assert_eq!(config.pipeline.frame_stride, 4);
        assert_eq!(config.model.sequence_length, 40);
    }

    #[test]
    fn test_round_trip_through_file() {
        let path = std::env::temp_dir()
            .join(format!("leap-gesture-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let mut config = Config::default();
        config.model.sequence_length = 25;

        config.save(Some(&path)).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.model.sequence_length, 25);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.pipeline.frame_stride = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.devices.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hands_mode_parsing() {
        assert_eq!(HandsMode::from_arg("Both"), Some(HandsMode::Both));
        assert_eq!(HandsMode::from_arg("left"), Some(HandsMode::Left));
        assert_eq!(HandsMode::from_arg("feet"), None);
    }
}
