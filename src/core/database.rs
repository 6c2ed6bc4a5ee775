//! Read-only access to the source log database.
//!
//! The converter only talks to the log through the [`LogDatabase`] trait. Table
//! storage is shared by every implementation via [`LogTables`]; implementations
//! differ in where records come from and how radar sweeps are read.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use super::loaders::{LoaderError, RadarPointCloud};
use super::records::{
    AttributeRecord, CalibratedSensor, EgoPose, Sample, SampleAnnotation, SampleData, Scene,
};

/// Errors raised by log lookups. All of them abort the current split.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("no {table} record with token '{token}'")]
    MissingRecord { table: &'static str, token: String },

    #[error("sample '{sample}' has no data for channel {channel}")]
    MissingChannel { sample: String, channel: String },

    #[error("calibrated sensor '{0}' has no 3x3 camera intrinsic")]
    MissingIntrinsic(String),

    #[error("failed to read radar sweep '{path}': {source}")]
    Sweep {
        path: PathBuf,
        #[source]
        source: LoaderError,
    },
}

/// Result type for lookups.
pub type Result<T> = std::result::Result<T, LookupError>;

fn missing(table: &'static str, token: &str) -> LookupError {
    LookupError::MissingRecord {
        table,
        token: token.to_string(),
    }
}

/// Token-indexed tables of one dataset version.
///
/// Samples keep their insertion order, which is the log-native iteration
/// order seen by the converter. Inserting a key-frame sample_data or an
/// annotation links it into its (already inserted) sample.
#[derive(Debug, Default)]
pub struct LogTables {
    samples: Vec<Sample>,
    sample_index: HashMap<String, usize>,
    scenes: HashMap<String, Scene>,
    sample_data: HashMap<String, SampleData>,
    ego_poses: HashMap<String, EgoPose>,
    calibrated_sensors: HashMap<String, CalibratedSensor>,
    annotations: HashMap<String, SampleAnnotation>,
    attributes: HashMap<String, AttributeRecord>,
}

impl LogTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_scene(&mut self, scene: Scene) {
        self.scenes.insert(scene.token.clone(), scene);
    }

    /// Appends a sample, replacing an earlier one with the same token in place.
    pub fn insert_sample(&mut self, sample: Sample) {
        match self.sample_index.get(&sample.token) {
            Some(&idx) => self.samples[idx] = sample,
            None => {
                self.sample_index
                    .insert(sample.token.clone(), self.samples.len());
                self.samples.push(sample);
            }
        }
    }

    pub fn insert_sample_data(&mut self, record: SampleData) {
        if record.is_key_frame && !record.channel.is_empty() {
            if let Some(&idx) = self.sample_index.get(&record.sample_token) {
                self.samples[idx]
                    .data
                    .insert(record.channel.clone(), record.token.clone());
            }
        }
        self.sample_data.insert(record.token.clone(), record);
    }

    pub fn insert_ego_pose(&mut self, pose: EgoPose) {
        self.ego_poses.insert(pose.token.clone(), pose);
    }

    pub fn insert_calibrated_sensor(&mut self, sensor: CalibratedSensor) {
        self.calibrated_sensors.insert(sensor.token.clone(), sensor);
    }

    pub fn insert_annotation(&mut self, annotation: SampleAnnotation) {
        if let Some(&idx) = self.sample_index.get(&annotation.sample_token) {
            let anns = &mut self.samples[idx].anns;
            if !anns.contains(&annotation.token) {
                anns.push(annotation.token.clone());
            }
        }
        self.annotations.insert(annotation.token.clone(), annotation);
    }

    pub fn insert_attribute(&mut self, attribute: AttributeRecord) {
        self.attributes.insert(attribute.token.clone(), attribute);
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, token: &str) -> Result<&Sample> {
        self.sample_index
            .get(token)
            .map(|&idx| &self.samples[idx])
            .ok_or_else(|| missing("sample", token))
    }

    pub fn scene(&self, token: &str) -> Result<&Scene> {
        self.scenes.get(token).ok_or_else(|| missing("scene", token))
    }

    pub fn sample_data(&self, token: &str) -> Result<&SampleData> {
        self.sample_data
            .get(token)
            .ok_or_else(|| missing("sample_data", token))
    }

    pub fn ego_pose(&self, token: &str) -> Result<&EgoPose> {
        self.ego_poses
            .get(token)
            .ok_or_else(|| missing("ego_pose", token))
    }

    pub fn calibrated_sensor(&self, token: &str) -> Result<&CalibratedSensor> {
        self.calibrated_sensors
            .get(token)
            .ok_or_else(|| missing("calibrated_sensor", token))
    }

    pub fn sample_annotation(&self, token: &str) -> Result<&SampleAnnotation> {
        self.annotations
            .get(token)
            .ok_or_else(|| missing("sample_annotation", token))
    }

    pub fn attribute(&self, token: &str) -> Result<&AttributeRecord> {
        self.attributes
            .get(token)
            .ok_or_else(|| missing("attribute", token))
    }

    /// Key-frame sample_data of `sample` for a sensor channel.
    pub fn sample_data_for(&self, sample: &Sample, channel: &str) -> Result<&SampleData> {
        let token = sample
            .data
            .get(channel)
            .ok_or_else(|| LookupError::MissingChannel {
                sample: sample.token.clone(),
                channel: channel.to_string(),
            })?;
        self.sample_data(token)
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The external log collaborator.
///
/// Lookups are read-only and safe to repeat; `Sync` lets radar channels of one
/// frame be loaded in parallel.
pub trait LogDatabase: Sync {
    /// Backing tables.
    fn tables(&self) -> &LogTables;

    /// Reads the radar points of one sweep in its sensor frame.
    fn load_radar_points(&self, record: &SampleData) -> Result<RadarPointCloud>;

    /// Samples in log-native iteration order.
    fn samples(&self) -> &[Sample] {
        self.tables().samples()
    }

    fn sample(&self, token: &str) -> Result<&Sample> {
        self.tables().sample(token)
    }

    fn scene(&self, token: &str) -> Result<&Scene> {
        self.tables().scene(token)
    }

    fn sample_data(&self, token: &str) -> Result<&SampleData> {
        self.tables().sample_data(token)
    }

    fn sample_data_for(&self, sample: &Sample, channel: &str) -> Result<&SampleData> {
        self.tables().sample_data_for(sample, channel)
    }

    fn ego_pose(&self, token: &str) -> Result<&EgoPose> {
        self.tables().ego_pose(token)
    }

    fn calibrated_sensor(&self, token: &str) -> Result<&CalibratedSensor> {
        self.tables().calibrated_sensor(token)
    }

    fn sample_annotation(&self, token: &str) -> Result<&SampleAnnotation> {
        self.tables().sample_annotation(token)
    }

    fn attribute(&self, token: &str) -> Result<&AttributeRecord> {
        self.tables().attribute(token)
    }
}
