//! Conversion stages.

pub mod annotations;
pub mod converter;
pub mod frames;
pub mod radar_fusion;
pub mod segmenter;
pub mod sequencer;
pub mod visibility;

// Re-export key types for convenience
pub use annotations::{derive_annotations, DerivationStats, DeriveError};
pub use converter::{ConvertedFrame, ConvertedSplit, SplitConverter, SplitSummary};
pub use frames::{compose_transforms, FrameTransforms};
pub use radar_fusion::{fuse_radar_for_camera, load_multisweep};
pub use segmenter::{ConversionContext, TrackRegistry};
pub use sequencer::{sequence_frames, sequence_key, SEQUENCE_STRIDE};
pub use visibility::{bbox_inside, filter_occluded};
