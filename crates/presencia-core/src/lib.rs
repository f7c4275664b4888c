//! presencia-core — Face detection and recognition engine.
//!
//! Wraps a lightweight ONNX face detector and an embedding encoder, and
//! classifies live embeddings against enrolled descriptor sets with a
//! nearest-neighbor Euclidean matcher.

pub mod detector;
pub mod encoder;
pub mod engine;
pub mod imaging;
pub mod types;

pub use engine::{EngineError, FaceEngine, FaceSample, ModelPaths};
pub use types::{
    confidence_pct, Descriptor, EnrolledIdentity, FaceMatcher, MatchOutcome, CONFIDENT_DISTANCE,
    MATCHER_GATE,
};
