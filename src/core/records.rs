//! Records of the source log database.
//!
//! Field names follow the JSON tables of a nuScenes-style dataset version
//! directory. Fields marked `#[serde(default)]` that the tables do not store
//! (`Sample::data`, `Sample::anns`, `SampleData::channel`,
//! `SampleAnnotation::category_name`) are filled in while the tables are
//! loaded, see [`NuScenesDb::load`](super::loaders::NuScenesDb::load).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A recording session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    pub token: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One synchronized multi-sensor capture instant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sample {
    pub token: String,
    pub timestamp: i64,
    pub scene_token: String,
    /// Token of the preceding sample, empty at the start of a scene
    #[serde(default)]
    pub prev: String,
    #[serde(default)]
    pub next: String,
    /// Sensor channel to key-frame sample_data token
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Annotation tokens of this sample
    #[serde(default)]
    pub anns: Vec<String>,
}

impl Sample {
    /// Returns true if the sample is linked to a predecessor in its scene.
    #[inline]
    pub fn has_predecessor(&self) -> bool {
        !self.prev.is_empty()
    }
}

/// One sensor reading (image or radar sweep) with its file reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleData {
    pub token: String,
    pub sample_token: String,
    pub ego_pose_token: String,
    pub calibrated_sensor_token: String,
    pub timestamp: i64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub is_key_frame: bool,
    #[serde(default)]
    pub prev: String,
    #[serde(default)]
    pub next: String,
    /// Sensor channel, resolved through the calibrated sensor
    #[serde(default)]
    pub channel: String,
}

/// Vehicle pose in the global frame. Rotation is a `[w, x, y, z]` quaternion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EgoPose {
    pub token: String,
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
    #[serde(default)]
    pub timestamp: i64,
}

/// Sensor mounting relative to the ego frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibratedSensor {
    pub token: String,
    pub sensor_token: String,
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
    /// 3x3 intrinsic matrix for cameras, empty for other modalities
    #[serde(default)]
    pub camera_intrinsic: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sensor {
    pub token: String,
    pub channel: String,
    #[serde(default)]
    pub modality: String,
}

/// A 3D box annotation in the global frame. `size` is `[width, length, height]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleAnnotation {
    pub token: String,
    pub sample_token: String,
    pub instance_token: String,
    #[serde(default)]
    pub attribute_tokens: Vec<String>,
    pub translation: [f64; 3],
    pub size: [f64; 3],
    pub rotation: [f64; 4],
    #[serde(default)]
    pub prev: String,
    #[serde(default)]
    pub next: String,
    /// General category name, resolved through the instance
    #[serde(default)]
    pub category_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instance {
    pub token: String,
    pub category_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub token: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub token: String,
    pub name: String,
}
