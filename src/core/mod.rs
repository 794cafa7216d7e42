//! Frame processing pipeline.
//!
//! This module contains:
//! - Frame flattening and hand continuity
//! - Derived geometric features and movement indicators
//! - Feature ordering, standardization and the rolling window
//! - The session that ties them together per tick

pub mod buffer;
pub mod continuity;
pub mod derived;
pub mod frame;
pub mod keys;
pub mod motion;
pub mod schema;
pub mod session;
pub mod unpack;
pub mod window;

// Re-export commonly used types
pub use buffer::CircularBuffer;
pub use continuity::{ContinuityResolver, RefreshPolicy, Resolved};
pub use derived::{DerivedFeatureEngine, DerivedFeatureSet, OneHandedFeature, TwoHandedFeature};
pub use frame::{FlatFrame, HandPresence};
pub use keys::Hand;
pub use motion::{MotionIndicators, MotionSettings, MotionTracker};
pub use schema::{FeatureSchema, Standardizer};
pub use session::{Prediction, Session, TickReport, TickStatus};
pub use unpack::{unpack_frame, UnpackContext};
pub use window::{WindowEngine, WindowTensor};
