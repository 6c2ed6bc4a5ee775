//! Multi-sensor log to annotated-frame dataset converter.
//!
//! This crate turns a nuScenes-style log database (samples, ego poses,
//! calibrated sensors, 3D box annotations and radar sweeps) into a single
//! flattened, detection-training-ready dataset per split:
//! - Scene segmentation with per-scene video, frame and track identities
//! - Global/ego/sensor transform composition for positions and velocities
//! - Multi-sweep radar fusion per camera view
//! - 2D/3D annotation derivation and depth-ordered occlusion pruning
//! - Deterministic (video, sensor) sequencing of the output frames
//!
//! # Example
//!
//! ```no_run
//! use radar_camera_converter::{ConverterConfig, core::loaders::NuScenesDb, processors::SplitConverter};
//!
//! let config = ConverterConfig::default();
//! let db = NuScenesDb::load(&config.dataset.root, "v1.0-mini", &config.radar.filters).unwrap();
//! let converted = SplitConverter::new(&db, &config).convert_split("mini_val").unwrap();
//! println!("{} images", converted.dataset.images.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ConverterConfig, DatasetConfig, RadarConfig, SensorConfig, SplitConfig};
pub use core::dataset::{AnnotationRecord, Attribute, Category, Dataset, ImageRecord, VideoInfo};
pub use core::loaders::RadarPointCloud;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
