//! Static parameter files loaded once at startup.
//!
//! | file                               | contents                                  |
//! |------------------------------------|-------------------------------------------|
//! | `VoI.txt`                          | predictor variable base names              |
//! | `VoI_drop.txt`                     | variables left out at inference time       |
//! | `derived_features_one_handed.txt`  | one-handed derived feature groups          |
//! | `derived_features_two_handed.txt`  | two-handed derived feature groups          |
//! | `gestures.txt`                     | gesture vocabulary, index 0 = no gesture   |
//! | `means_dict.json`, `stds_dict.json`| per-feature statistics                     |
//!
//! Text files hold one entry per line; blank lines and lines starting with `#`
//! are ignored. The drop list and derived feature files may be absent.

use crate::config::ConfigError;
use crate::core::derived::{DerivedFeatureSet, OneHandedFeature, TwoHandedFeature};
use crate::core::keys::Hand;
use crate::core::schema::{predictor_keys, FeatureSchema};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const VOI_FILE: &str = "VoI.txt";
pub const VOI_DROP_FILE: &str = "VoI_drop.txt";
pub const DERIVED_ONE_HANDED_FILE: &str = "derived_features_one_handed.txt";
pub const DERIVED_TWO_HANDED_FILE: &str = "derived_features_two_handed.txt";
pub const GESTURES_FILE: &str = "gestures.txt";
pub const MEANS_FILE: &str = "means_dict.json";
pub const STDS_FILE: &str = "stds_dict.json";

/// Everything read from the parameter directory.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    /// Predictor variable base names (no hand prefix)
    pub voi: Vec<String>,
    /// Variables dropped at inference time
    pub voi_drop: Vec<String>,
    /// Derived features to compute
    pub derived: DerivedFeatureSet,
    /// Gesture labels by classifier output index
    pub gestures: Vec<String>,
    /// Feature means
    pub means: HashMap<String, f64>,
    /// Feature standard deviations
    pub stds: HashMap<String, f64>,
}

impl ParameterSet {
    /// Load and check every parameter file under `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let optional_list = |name: &str| -> Result<Vec<String>, ConfigError> {
            let path = dir.join(name);
            if path.exists() {
                read_list(&path)
            } else {
                Ok(Vec::new())
            }
        };

        let derived = DerivedFeatureSet {
            one_handed: parse_names::<OneHandedFeature>(&optional_list(DERIVED_ONE_HANDED_FILE)?)?,
            two_handed: parse_names::<TwoHandedFeature>(&optional_list(DERIVED_TWO_HANDED_FILE)?)?,
        };

        let params = Self {
            voi: read_list(&dir.join(VOI_FILE))?,
            voi_drop: optional_list(VOI_DROP_FILE)?,
            derived,
            gestures: read_list(&dir.join(GESTURES_FILE))?,
            means: read_statistics(&dir.join(MEANS_FILE))?,
            stds: read_statistics(&dir.join(STDS_FILE))?,
        };
        params.validate()?;
        Ok(params)
    }

    /// Consistency checks between the lists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.voi.is_empty() {
            return Err(ConfigError::Params(format!("{VOI_FILE} lists no variables")));
        }
        if let Some(unknown) = self.voi_drop.iter().find(|v| !self.voi.contains(v)) {
            return Err(ConfigError::Params(format!(
                "{VOI_DROP_FILE} drops '{unknown}', which is not in {VOI_FILE}"
            )));
        }
        if self.gestures.is_empty() {
            return Err(ConfigError::Params(format!("{GESTURES_FILE} lists no gestures")));
        }
        Ok(())
    }

    /// Hand-prefixed predictors for the given hands.
    pub fn predictors(&self, hands: &[Hand]) -> Vec<String> {
        predictor_keys(&self.voi, &self.voi_drop, hands)
    }

    /// The feature order implied by the configuration alone.
    pub fn expected_schema(&self, hands: &[Hand]) -> FeatureSchema {
        FeatureSchema::new(&self.predictors(hands), self.derived.keys(hands))
    }

    /// Label for a classifier output index.
    pub fn gesture(&self, index: usize) -> Option<&str> {
        self.gestures.get(index).map(String::as_str)
    }
}

/// Read a text file, dropping blank lines and `#` comments.
pub fn read_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    Ok(parse_list(&content))
}

/// Lines of `content` that are neither blank nor comments, trimmed.
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn parse_names<T>(names: &[String]) -> Result<Vec<T>, ConfigError>
where
    T: std::str::FromStr<Err = String>,
{
    names
        .iter()
        .map(|name| name.parse::<T>().map_err(ConfigError::Params))
        .collect()
}

fn read_statistics(path: &Path) -> Result<HashMap<String, f64>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse(format!("{path:?}: {e}")))
}

fn io_error(path: &Path, err: std::io::Error) -> ConfigError {
    ConfigError::Io(format!("{}: {err}", PathBuf::from(path).display()))
}
