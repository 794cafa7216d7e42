//! Geometric and kinematic features computed from raw positions.
//!
//! Fingertips are numbered f1 (thumb) to f5 (pinky) in the emitted names:
//! `{hand}_f1_2` is the thumb-index tip distance, `{hand}_f3_p` the middle tip to
//! palm centre distance, `{hand}_f3_p_plain` its signed distance to the palm
//! plane, `f2_lr` the distance between the two index tips.

use crate::core::frame::FlatFrame;
use crate::core::keys::{self, Hand, FINGERS};
use crate::error::DerivedError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Features computed for each hand on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneHandedFeature {
    InterfingerDistances,
    FingerPalmDistances,
    FingerPalmPlaneDistances,
    WristAngle,
    PalmSpeed,
}

/// Features that need both hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoHandedFeature {
    PalmDistance,
    SameFingerDistances,
    PalmAngle,
}

impl FromStr for OneHandedFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "interfinger_distances" => Ok(Self::InterfingerDistances),
            "finger_palm_distances" => Ok(Self::FingerPalmDistances),
            "finger_palm_plane_distances" | "finger_palm_plain_distances" => {
                Ok(Self::FingerPalmPlaneDistances)
            }
            "wrist_angle" => Ok(Self::WristAngle),
            "palm_speed" => Ok(Self::PalmSpeed),
            other => Err(format!("unknown one-handed feature '{other}'")),
        }
    }
}

impl FromStr for TwoHandedFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "palm_distance" | "interpalm_distance" => Ok(Self::PalmDistance),
            "same_finger_distances" => Ok(Self::SameFingerDistances),
            "palm_angle" => Ok(Self::PalmAngle),
            other => Err(format!("unknown two-handed feature '{other}'")),
        }
    }
}

impl fmt::Display for OneHandedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InterfingerDistances => "interfinger_distances",
            Self::FingerPalmDistances => "finger_palm_distances",
            Self::FingerPalmPlaneDistances => "finger_palm_plane_distances",
            Self::WristAngle => "wrist_angle",
            Self::PalmSpeed => "palm_speed",
        };
        f.write_str(name)
    }
}

impl fmt::Display for TwoHandedFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PalmDistance => "palm_distance",
            Self::SameFingerDistances => "same_finger_distances",
            Self::PalmAngle => "palm_angle",
        };
        f.write_str(name)
    }
}

/// Which derived features to compute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFeatureSet {
    pub one_handed: Vec<OneHandedFeature>,
    pub two_handed: Vec<TwoHandedFeature>,
}

impl DerivedFeatureSet {
    pub fn is_empty(&self) -> bool {
        self.one_handed.is_empty() && self.two_handed.is_empty()
    }

    /// Keys [`DerivedFeatureEngine::compute`] will emit for `hands`.
    pub fn keys(&self, hands: &[Hand]) -> Vec<String> {
        let mut out = Vec::new();
        for &hand in hands {
            for feature in &self.one_handed {
                out.extend(one_handed_keys(*feature, hand));
            }
        }
        if hands.len() == 2 {
            for feature in &self.two_handed {
                out.extend(two_handed_keys(*feature));
            }
        }
        out
    }
}

fn one_handed_keys(feature: OneHandedFeature, hand: Hand) -> Vec<String> {
    match feature {
        OneHandedFeature::InterfingerDistances => (1..5)
            .map(|i| keys::hand_key(hand, &format!("f{}_{}", i, i + 1)))
            .collect(),
        OneHandedFeature::FingerPalmDistances => (1..=5)
            .map(|i| keys::hand_key(hand, &format!("f{i}_p")))
            .collect(),
        OneHandedFeature::FingerPalmPlaneDistances => (1..=5)
            .map(|i| keys::hand_key(hand, &format!("f{i}_p_plain")))
            .collect(),
        OneHandedFeature::WristAngle => vec![keys::hand_key(hand, "wrist_angle")],
        OneHandedFeature::PalmSpeed => vec![keys::hand_key(hand, "palm_speed")],
    }
}

fn two_handed_keys(feature: TwoHandedFeature) -> Vec<String> {
    match feature {
        TwoHandedFeature::PalmDistance => vec!["palm_distance".to_string()],
        TwoHandedFeature::SameFingerDistances => (1..=5).map(|i| format!("f{i}_lr")).collect(),
        TwoHandedFeature::PalmAngle => vec!["palm_angle".to_string()],
    }
}

/// Raw vectors of one hand needed by the feature set.
struct HandGeometry {
    tips: [[f64; 3]; 5],
    palm: [f64; 3],
    normal: [f64; 3],
}

impl HandGeometry {
    fn read(frame: &FlatFrame, hand: Hand) -> Result<Self, DerivedError> {
        Ok(Self {
            tips: read_tips(frame, hand)?,
            palm: read_vector(frame, &keys::hand_vector(hand, "palmPosition"))?,
            normal: read_vector(frame, &keys::hand_vector(hand, "palmNormal"))?,
        })
    }
}

/// Computes the configured derived features for the required hands.
#[derive(Debug, Clone)]
pub struct DerivedFeatureEngine {
    features: DerivedFeatureSet,
    hands: Vec<Hand>,
}

impl DerivedFeatureEngine {
    pub fn new(features: DerivedFeatureSet, hands: Vec<Hand>) -> Self {
        Self { features, hands }
    }

    /// Keys emitted on every successful call to [`compute`](Self::compute).
    pub fn keys(&self) -> Vec<String> {
        self.features.keys(&self.hands)
    }

    /// Compute every configured feature from a resolved frame.
    pub fn compute(&self, frame: &FlatFrame) -> Result<Vec<(String, f64)>, DerivedError> {
        let mut out = Vec::new();
        if self.features.is_empty() {
            return Ok(out);
        }

        let mut geometry = Vec::with_capacity(self.hands.len());
        for &hand in &self.hands {
            geometry.push((hand, HandGeometry::read(frame, hand)?));
        }

        for (hand, geo) in &geometry {
            for feature in &self.features.one_handed {
                let names = one_handed_keys(*feature, *hand);
                let values = match feature {
                    OneHandedFeature::InterfingerDistances => fingertip_gaps(&geo.tips).to_vec(),
                    OneHandedFeature::FingerPalmDistances => {
                        geo.tips.iter().map(|tip| distance(tip, &geo.palm)).collect()
                    }
                    OneHandedFeature::FingerPalmPlaneDistances => geo
                        .tips
                        .iter()
                        .map(|tip| dot(&sub(tip, &geo.palm), &geo.normal))
                        .collect(),
                    OneHandedFeature::WristAngle => {
                        let wrist = read_vector(frame, &keys::hand_vector(*hand, "wrist"))?;
                        let elbow = read_vector(frame, &keys::hand_vector(*hand, "elbow"))?;
                        vec![dot(&unit(&sub(&wrist, &elbow)), &geo.normal)]
                    }
                    OneHandedFeature::PalmSpeed => {
                        let velocity =
                            read_vector(frame, &keys::hand_vector(*hand, "palmVelocity"))?;
                        vec![norm(&velocity)]
                    }
                };
                out.extend(names.into_iter().zip(values));
            }
        }

        if let [(_, left), (_, right)] = geometry.as_slice() {
            for feature in &self.features.two_handed {
                let names = two_handed_keys(*feature);
                let values = match feature {
                    TwoHandedFeature::PalmDistance => vec![distance(&left.palm, &right.palm)],
                    TwoHandedFeature::SameFingerDistances => left
                        .tips
                        .iter()
                        .zip(right.tips.iter())
                        .map(|(l, r)| distance(l, r))
                        .collect(),
                    TwoHandedFeature::PalmAngle => vec![dot(&left.normal, &right.normal)],
                };
                out.extend(names.into_iter().zip(values));
            }
        }

        Ok(out)
    }
}

/// Distances between adjacent fingertips, thumb-index to ring-pinky.
pub fn fingertip_gaps(tips: &[[f64; 3]; 5]) -> [f64; 4] {
    let mut gaps = [0.0; 4];
    for (gap, pair) in gaps.iter_mut().zip(tips.windows(2)) {
        *gap = distance(&pair[0], &pair[1]);
    }
    gaps
}

/// Read all five fingertip positions of a hand.
pub fn read_tips(frame: &FlatFrame, hand: Hand) -> Result<[[f64; 3]; 5], DerivedError> {
    let mut tips = [[0.0; 3]; 5];
    for (tip, finger) in tips.iter_mut().zip(FINGERS) {
        *tip = read_vector(frame, &keys::tip_vector(hand, finger))?;
    }
    Ok(tips)
}

pub fn read_vector(frame: &FlatFrame, keys: &[String; 3]) -> Result<[f64; 3], DerivedError> {
    frame.vector3(keys).map_err(DerivedError::MissingKey)
}

fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: &[f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm(&sub(a, b))
}

fn unit(a: &[f64; 3]) -> [f64; 3] {
    let length = norm(a);
    if length == 0.0 {
        return [0.0; 3];
    }
    [a[0] / length, a[1] / length, a[2] / length]
}
