//! Feature ordering and standardization.
//!
//! The classifier was trained on columns in lexicographic order, so the same
//! order is rebuilt here: hand-prefixed predictor variables plus derived feature
//! keys, sorted. Statistics are looked up once per feature when the order is
//! fixed; per-tick standardization is then a pair of slice walks.

use crate::config::ConfigError;
use crate::core::frame::FlatFrame;
use crate::core::keys::{self, Hand};
use std::collections::HashMap;

/// Hand-prefixed predictor names: every VoI not in the drop list, for each hand.
pub fn predictor_keys(voi: &[String], voi_drop: &[String], hands: &[Hand]) -> Vec<String> {
    voi.iter()
        .filter(|v| !voi_drop.contains(v))
        .flat_map(|v| hands.iter().map(move |&hand| keys::hand_key(hand, v)))
        .collect()
}

/// A fixed, sorted list of feature names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Concatenate predictors and derived keys, then sort.
    pub fn new<I>(predictors: &[String], derived: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut names: Vec<String> = predictors.iter().cloned().chain(derived).collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    /// Raw values in schema order, or the first missing key.
    pub fn extract(&self, frame: &FlatFrame) -> Result<Vec<f64>, String> {
        self.names
            .iter()
            .map(|name| frame.get(name).ok_or_else(|| name.clone()))
            .collect()
    }

    /// Names present in one schema and not the other, for error messages.
    pub fn difference(&self, other: &FeatureSchema) -> Vec<String> {
        let mut diff: Vec<String> = self
            .names
            .iter()
            .filter(|n| other.index_of(n).is_none())
            .chain(other.names.iter().filter(|n| self.index_of(n).is_none()))
            .cloned()
            .collect();
        diff.sort();
        diff
    }
}

/// Per-feature mean and standard deviation aligned with a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Standardizer {
    /// Look up statistics for every feature of `schema`.
    ///
    /// A missing entry, a non-finite value, or a zero standard deviation is a
    /// configuration error.
    pub fn new(
        schema: &FeatureSchema,
        means: &HashMap<String, f64>,
        stds: &HashMap<String, f64>,
    ) -> Result<Self, ConfigError> {
        let mut mean_values = Vec::with_capacity(schema.len());
        let mut std_values = Vec::with_capacity(schema.len());

        for name in schema.names() {
            let mean = *means.get(name).ok_or_else(|| ConfigError::MissingStatistic {
                key: name.clone(),
                which: "mean",
            })?;
            let std = *stds.get(name).ok_or_else(|| ConfigError::MissingStatistic {
                key: name.clone(),
                which: "std",
            })?;
            if !mean.is_finite() || !std.is_finite() || std == 0.0 {
                return Err(ConfigError::BadStatistic {
                    key: name.clone(),
                    mean,
                    std,
                });
            }
            mean_values.push(mean);
            std_values.push(std);
        }

        Ok(Self {
            means: mean_values,
            stds: std_values,
        })
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// `(x - mean) / std` for each value in schema order.
    pub fn standardize(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(x, (mean, std))| (x - mean) / std)
            .collect()
    }

    /// Inverse of [`standardize`](Self::standardize).
    pub fn destandardize(&self, standardized: &[f64]) -> Vec<f64> {
        standardized
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(z, (mean, std))| z * std + mean)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn stats(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_predictors_skip_dropped_variables() {
        let voi = strings(&["palmPosition_0", "grabStrength", "confidence"]);
        let drop = strings(&["confidence"]);
        let keys = predictor_keys(&voi, &drop, &Hand::BOTH);

        assert_eq!(
            keys,
            strings(&[
                "left_palmPosition_0",
                "right_palmPosition_0",
                "left_grabStrength",
                "right_grabStrength",
            ])
        );
    }

    #[test]
    fn test_schema_is_sorted() {
        let predictors = strings(&["right_b", "left_b"]);
        let schema = FeatureSchema::new(&predictors, strings(&["palm_distance", "left_f1_2"]));

        assert_eq!(
            schema.names(),
            strings(&["left_b", "left_f1_2", "palm_distance", "right_b"]).as_slice()
        );
        assert_eq!(schema.index_of("palm_distance"), Some(2));
    }

    #[test]
    fn test_extract_reports_missing_key() {
        let schema = FeatureSchema::new(&strings(&["a", "b"]), Vec::new());
        let mut frame = FlatFrame::new();
        frame.insert("a", 1.0);

        assert_eq!(schema.extract(&frame), Err("b".to_string()));
        frame.insert("b", 2.0);
        assert_eq!(schema.extract(&frame), Ok(vec![1.0, 2.0]));
    }

    #[test]
    fn test_standardize_round_trip() {
        let schema = FeatureSchema::new(&strings(&["a", "b"]), Vec::new());
        let standardizer = Standardizer::new(
            &schema,
            &stats(&[("a", 10.0), ("b", -3.0)]),
            &stats(&[("a", 2.0), ("b", 0.5)]),
        )
        .unwrap();

        let raw = vec![14.0, -2.0];
        let z = standardizer.standardize(&raw);
        assert_eq!(z, vec![2.0, 2.0]);

        let back = standardizer.destandardize(&z);
        for (original, recovered) in raw.iter().zip(back.iter()) {
            assert!((original - recovered).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_or_zero_statistics_are_config_errors() {
        let schema = FeatureSchema::new(&strings(&["a"]), Vec::new());

        let missing = Standardizer::new(&schema, &stats(&[]), &stats(&[("a", 1.0)]));
        assert!(matches!(
            missing,
            Err(ConfigError::MissingStatistic { which: "mean", .. })
        ));

        let zero = Standardizer::new(&schema, &stats(&[("a", 1.0)]), &stats(&[("a", 0.0)]));
        assert!(matches!(zero, Err(ConfigError::BadStatistic { .. })));
    }

    #[test]
    fn test_difference() {
        let a = FeatureSchema::new(&strings(&["x", "y"]), Vec::new());
        let b = FeatureSchema::new(&strings(&["y", "z"]), Vec::new());
        assert_eq!(a.difference(&b), strings(&["x", "z"]));
    }
}
