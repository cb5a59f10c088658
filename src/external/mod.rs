//! Collaborators the engine drives but does not implement.
//!
//! The concrete window handle, input synthesis back-end, and recognition
//! models live outside this crate. These modules pin down the interfaces the
//! engine consumes so back-ends can be swapped without touching strategies.

pub mod detection;
pub mod input;
pub mod session;

pub use detection::{
    Candidate, ColorIndicator, ColorRangeDetector, ColorRangeQuery, Detection, DetectionError,
    HsvColor, IndicatorProbe, ModelBackend, ModelDetector, ModelQuery, non_max_suppression,
};
pub use input::{InputDriver, MouseButton, ScrollDirection};
pub use session::{Frame, GameSession, Region, SessionError};
