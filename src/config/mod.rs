//! Configuration types for the converter.

mod scene_splits;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::processors::sequencer::SEQUENCE_STRIDE;

pub use scene_splits::default_scene_splits;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("used sensor {0} has no sensor id")]
    MissingSensorId(String),

    #[error("sensor {sensor} has id {id}, ids must be below {limit}")]
    SensorIdOutOfRange { sensor: String, id: u32, limit: u32 },

    #[error("camera {0} has no associated radar channels")]
    MissingRadarAssociation(String),

    #[error("num_sweeps must be at least 1")]
    ZeroSweeps,
}

/// Location of the source dataset and of the produced annotation files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset root; version directories (e.g. `v1.0-mini`) live below it
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Output directory, derived from the root and sweep count when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from("../../data/nuscenes/")
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            output_dir: None,
        }
    }
}

/// One output split and the dataset version it is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub name: String,
    pub version: String,
}

impl SplitConfig {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

fn default_splits() -> Vec<SplitConfig> {
    vec![
        SplitConfig::new("mini_val", "v1.0-mini"),
        SplitConfig::new("mini_train", "v1.0-mini"),
        SplitConfig::new("train", "v1.0-trainval"),
        SplitConfig::new("val", "v1.0-trainval"),
        SplitConfig::new("test", "v1.0-test"),
    ]
}

/// Sensor selection and the integer ids written to the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Camera channels that produce image records
    #[serde(default = "default_used_sensors")]
    pub used: Vec<String>,

    /// Channel name to sensor id
    #[serde(default = "default_sensor_ids")]
    pub ids: BTreeMap<String, u32>,
}

fn default_used_sensors() -> Vec<String> {
    [
        "CAM_FRONT",
        "CAM_FRONT_RIGHT",
        "CAM_BACK_RIGHT",
        "CAM_BACK",
        "CAM_BACK_LEFT",
        "CAM_FRONT_LEFT",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sensor_ids() -> BTreeMap<String, u32> {
    let mut ids = BTreeMap::new();
    ids.insert("CAM_FRONT".to_string(), 1);
    ids.insert("CAM_FRONT_RIGHT".to_string(), 2);
    ids.insert("CAM_BACK_RIGHT".to_string(), 3);
    ids.insert("CAM_BACK".to_string(), 4);
    ids.insert("CAM_BACK_LEFT".to_string(), 5);
    ids.insert("CAM_FRONT_LEFT".to_string(), 6);
    ids.insert("RADAR_FRONT".to_string(), 7);
    ids.insert("LIDAR_TOP".to_string(), 8);
    ids.insert("RADAR_FRONT_LEFT".to_string(), 9);
    ids.insert("RADAR_FRONT_RIGHT".to_string(), 10);
    ids.insert("RADAR_BACK_LEFT".to_string(), 11);
    ids.insert("RADAR_BACK_RIGHT".to_string(), 12);
    ids
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            used: default_used_sensors(),
            ids: default_sensor_ids(),
        }
    }
}

impl SensorConfig {
    /// Returns true if the channel produces image records.
    pub fn is_used(&self, channel: &str) -> bool {
        self.used.iter().any(|s| s == channel)
    }

    /// Returns the output id of a channel.
    pub fn id(&self, channel: &str) -> Option<u32> {
        self.ids.get(channel).copied()
    }
}

/// Point filters applied when a radar sweep is read from disk.
///
/// Field indices refer to the 18-field radar layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarFilterConfig {
    /// Skip all filters
    #[serde(default)]
    pub disabled: bool,

    /// Accepted `invalid_state` values
    #[serde(default = "default_invalid_states")]
    pub invalid_states: Vec<i32>,

    /// Accepted `dyn_prop` values
    #[serde(default = "default_dynprop_states")]
    pub dynprop_states: Vec<i32>,

    /// Accepted `ambig_state` values
    #[serde(default = "default_ambig_states")]
    pub ambig_states: Vec<i32>,
}

fn default_invalid_states() -> Vec<i32> {
    vec![0]
}

fn default_dynprop_states() -> Vec<i32> {
    (0..7).collect()
}

fn default_ambig_states() -> Vec<i32> {
    vec![3]
}

impl Default for RadarFilterConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            invalid_states: default_invalid_states(),
            dynprop_states: default_dynprop_states(),
            ambig_states: default_ambig_states(),
        }
    }
}

/// Configuration for radar fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Number of consecutive sweeps accumulated per radar channel
    #[serde(default = "default_num_sweeps")]
    pub num_sweeps: usize,

    /// Points closer than this radius (meters, sensor frame) are dropped
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,

    /// Camera channel to the radar channels fused into its frames
    #[serde(default = "default_radars_for_camera")]
    pub radars_for_camera: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub filters: RadarFilterConfig,
}

fn default_num_sweeps() -> usize {
    6
}

fn default_min_distance() -> f32 {
    1.0
}

fn default_radars_for_camera() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 6] = [
        ("CAM_FRONT_LEFT", &["RADAR_FRONT_LEFT", "RADAR_FRONT"]),
        ("CAM_FRONT_RIGHT", &["RADAR_FRONT_RIGHT", "RADAR_FRONT"]),
        (
            "CAM_FRONT",
            &["RADAR_FRONT_RIGHT", "RADAR_FRONT_LEFT", "RADAR_FRONT"],
        ),
        ("CAM_BACK_LEFT", &["RADAR_BACK_LEFT", "RADAR_FRONT_LEFT"]),
        ("CAM_BACK_RIGHT", &["RADAR_BACK_RIGHT", "RADAR_FRONT_RIGHT"]),
        ("CAM_BACK", &["RADAR_BACK_RIGHT", "RADAR_BACK_LEFT"]),
    ];
    table
        .iter()
        .map(|(cam, radars)| {
            (
                cam.to_string(),
                radars.iter().map(|r| r.to_string()).collect(),
            )
        })
        .collect()
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            num_sweeps: default_num_sweeps(),
            min_distance: default_min_distance(),
            radars_for_camera: default_radars_for_camera(),
            filters: RadarFilterConfig::default(),
        }
    }
}

impl RadarConfig {
    /// Radar channels associated with a camera, empty when none are configured.
    pub fn radars_for(&self, camera: &str) -> &[String] {
        self.radars_for_camera
            .get(camera)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Configuration for 2D annotation derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationConfig {
    /// Image extent `[width, height]` used when projecting and clipping boxes
    #[serde(default = "default_reference_image_size")]
    pub reference_image_size: [u32; 2],
}

fn default_reference_image_size() -> [u32; 2] {
    [1600, 900]
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            reference_image_size: default_reference_image_size(),
        }
    }
}

/// Main converter configuration combining all sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default = "default_splits")]
    pub splits: Vec<SplitConfig>,

    /// Split name to the scenes it contains; splits without an entry take every scene
    #[serde(default = "default_scene_splits")]
    pub scene_splits: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub sensors: SensorConfig,

    #[serde(default)]
    pub radar: RadarConfig,

    #[serde(default)]
    pub annotation: AnnotationConfig,

    /// Render every converted frame to a PNG next to the output
    #[serde(default)]
    pub debug: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            splits: default_splits(),
            scene_splits: default_scene_splits(),
            sensors: SensorConfig::default(),
            radar: RadarConfig::default(),
            annotation: AnnotationConfig::default(),
            debug: false,
        }
    }
}

impl ConverterConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ConverterConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the cross-references between the sensor and radar tables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.radar.num_sweeps == 0 {
            return Err(ConfigError::ZeroSweeps);
        }
        for (sensor, &id) in &self.sensors.ids {
            if id >= SEQUENCE_STRIDE {
                return Err(ConfigError::SensorIdOutOfRange {
                    sensor: sensor.clone(),
                    id,
                    limit: SEQUENCE_STRIDE,
                });
            }
        }
        for camera in &self.sensors.used {
            if self.sensors.id(camera).is_none() {
                return Err(ConfigError::MissingSensorId(camera.clone()));
            }
            if !self.radar.radars_for_camera.contains_key(camera) {
                return Err(ConfigError::MissingRadarAssociation(camera.clone()));
            }
        }
        Ok(())
    }

    /// Directory the split documents are written to.
    pub fn output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dataset.output_dir {
            return dir.clone();
        }
        let name = if self.radar.num_sweeps > 1 {
            format!("annotations_{}sweeps", self.radar.num_sweeps)
        } else {
            "annotations".to_string()
        };
        self.dataset.root.join(name)
    }

    /// Scene whitelist for a split, `None` when the split takes every scene.
    pub fn scenes_for(&self, split: &str) -> Option<&[String]> {
        self.scene_splits.get(split).map(Vec::as_slice)
    }

    /// Looks up a configured split by name.
    pub fn split(&self, name: &str) -> Option<&SplitConfig> {
        self.splits.iter().find(|s| s.name == name)
    }
}
