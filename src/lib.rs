//! Leap Gesture Agent - real-time hand gesture recognition from Leap Motion
//! frame streams.
//!
//! The agent connects to one or more tracking services over WebSocket,
//! flattens each frame into named scalars, fills in a hand that briefly drops
//! out of tracking, derives geometric features, and feeds a rolling window of
//! standardized vectors to a sequence classifier. Alongside the gesture it
//! tracks two movement indicators, fury and angularity.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Leap Gesture Agent                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Sensor    │──▶│   Unpack    │──▶│ Continuity  │       │
//! │  │ (WebSocket) │   │ (flatten)   │   │ (fill hand) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Classifier  │◀──│   Window    │◀──│  Derived +  │       │
//! │  │   (ONNX)    │   │  (K frames) │   │ Indicators  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                                   │
//! │         ▼                                                   │
//! │  ┌─────────────┐   ┌─────────────┐                         │
//! │  │  Presenter  │   │  Recorder   │                         │
//! │  └─────────────┘   └─────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use leap_gesture_agent::{config::Config, params::ParameterSet, Session};
//!
//! let config = Config::default();
//! let params = ParameterSet::load(&config.params_dir).expect("parameter files");
//! let mut session = Session::new(&config, &params, None).expect("valid configuration");
//!
//! // Feed unpacked frames; `None` stands for a frame without hands.
//! let report = session.tick(None).expect("schema");
//! println!("{:?}", report.status);
//! ```

pub mod classifier;
pub mod config;
pub mod core;
pub mod error;
pub mod params;
pub mod presenter;
pub mod recording;
pub mod sensor;
pub mod stats;

// Re-export key types at crate root for convenience
pub use classifier::Classifier;
#[cfg(feature = "onnx")]
pub use classifier::OnnxClassifier;
pub use config::{Config, ConfigError};
pub use core::{FlatFrame, Hand, MotionIndicators, Prediction, Session, TickReport, TickStatus};
pub use error::{ClassifierError, ContinuityError, DerivedError, RecordingError, TransportError};
pub use params::ParameterSet;
pub use presenter::{ConsolePresenter, IndicatorHistory, Presenter};
pub use recording::{GestureSchedule, Recorder};
pub use sensor::{DeviceStatus, RawFrame, SensorHub, SensorMessage};
pub use stats::{SessionStats, SharedStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
