//! In-memory log database.
//!
//! Holds tables and radar sweeps built in code. Used to convert synthetic
//! logs and as the collaborator in tests.

use std::collections::HashMap;

use super::database::{LogDatabase, LogTables, Result};
use super::loaders::RadarPointCloud;
use super::records::SampleData;

/// A [`LogDatabase`] whose radar sweeps are keyed by sample_data token.
///
/// Sweeps without registered points read as empty clouds.
#[derive(Debug, Default)]
pub struct InMemoryLog {
    tables: LogTables,
    radar: HashMap<String, RadarPointCloud>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: LogTables) -> Self {
        Self {
            tables,
            radar: HashMap::new(),
        }
    }

    pub fn tables_mut(&mut self) -> &mut LogTables {
        &mut self.tables
    }

    /// Registers the sensor-frame points of one radar sweep.
    pub fn insert_radar_points(&mut self, sample_data_token: &str, cloud: RadarPointCloud) {
        self.radar.insert(sample_data_token.to_string(), cloud);
    }
}

impl LogDatabase for InMemoryLog {
    fn tables(&self) -> &LogTables {
        &self.tables
    }

    fn load_radar_points(&self, record: &SampleData) -> Result<RadarPointCloud> {
        Ok(self.radar.get(&record.token).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builder for small synthetic logs.
    //!
    //! Calibrations and ego poses default to identity, so the global frame
    //! coincides with every sensor frame unless a test overrides them. Key-frame
    //! sample_data tokens are `sd_<sample>_<channel>`, ego poses `ep_<sample>`
    //! and calibrations `cs_<channel>`.

    use super::*;
    use crate::core::loaders::NUM_RADAR_FIELDS;
    use crate::core::records::{
        AttributeRecord, CalibratedSensor, EgoPose, Sample, SampleAnnotation, Scene,
    };

    pub const IDENTITY: [f64; 4] = [1.0, 0.0, 0.0, 0.0];

    pub fn intrinsic() -> Vec<Vec<f64>> {
        vec![
            vec![1000.0, 0.0, 800.0],
            vec![0.0, 1000.0, 450.0],
            vec![0.0, 0.0, 1.0],
        ]
    }

    /// A radar point at `xyz` with compensated velocity `(vx, vy)`.
    pub fn radar_point(xyz: [f32; 3], vx_comp: f32, vy_comp: f32) -> [f32; NUM_RADAR_FIELDS] {
        let mut p = [0f32; NUM_RADAR_FIELDS];
        p[..3].copy_from_slice(&xyz);
        p[8] = vx_comp;
        p[9] = vy_comp;
        p[11] = 3.0;
        p
    }

    pub struct LogBuilder {
        log: InMemoryLog,
    }

    impl LogBuilder {
        pub fn new() -> Self {
            Self {
                log: InMemoryLog::new(),
            }
        }

        pub fn scene(&mut self, token: &str, name: &str) -> &mut Self {
            self.log.tables_mut().insert_scene(Scene {
                token: token.to_string(),
                name: name.to_string(),
                description: String::new(),
            });
            self
        }

        fn ensure_calibration(&mut self, channel: &str) {
            let token = format!("cs_{}", channel);
            if self.log.tables().calibrated_sensor(&token).is_ok() {
                return;
            }
            let camera_intrinsic = if channel.starts_with("CAM") {
                intrinsic()
            } else {
                Vec::new()
            };
            self.log.tables_mut().insert_calibrated_sensor(CalibratedSensor {
                token,
                sensor_token: format!("sn_{}", channel),
                translation: [0.0; 3],
                rotation: IDENTITY,
                camera_intrinsic,
            });
        }

        /// Adds a sample with one key frame per channel.
        pub fn sample(
            &mut self,
            token: &str,
            scene: &str,
            prev: &str,
            timestamp: i64,
            channels: &[&str],
        ) -> &mut Self {
            self.log.tables_mut().insert_sample(Sample {
                token: token.to_string(),
                timestamp,
                scene_token: scene.to_string(),
                prev: prev.to_string(),
                ..Default::default()
            });
            self.log.tables_mut().insert_ego_pose(EgoPose {
                token: format!("ep_{}", token),
                translation: [0.0; 3],
                rotation: IDENTITY,
                timestamp,
            });
            for channel in channels {
                self.ensure_calibration(channel);
                self.log.tables_mut().insert_sample_data(SampleData {
                    token: format!("sd_{}_{}", token, channel),
                    sample_token: token.to_string(),
                    ego_pose_token: format!("ep_{}", token),
                    calibrated_sensor_token: format!("cs_{}", channel),
                    timestamp,
                    filename: format!("samples/{}/{}.jpg", channel, token),
                    width: 1600,
                    height: 900,
                    is_key_frame: true,
                    channel: channel.to_string(),
                    ..Default::default()
                });
            }
            self
        }

        /// Overrides the ego pose of a sample.
        pub fn pose(&mut self, sample: &str, translation: [f64; 3], rotation: [f64; 4]) -> &mut Self {
            self.log.tables_mut().insert_ego_pose(EgoPose {
                token: format!("ep_{}", sample),
                translation,
                rotation,
                timestamp: 0,
            });
            self
        }

        /// Overrides the mounting of a channel.
        pub fn calibration(&mut self, channel: &str, translation: [f64; 3], rotation: [f64; 4]) -> &mut Self {
            self.ensure_calibration(channel);
            let mut cs = self
                .log
                .tables()
                .calibrated_sensor(&format!("cs_{}", channel))
                .cloned()
                .unwrap();
            cs.translation = translation;
            cs.rotation = rotation;
            self.log.tables_mut().insert_calibrated_sensor(cs);
            self
        }

        pub fn annotation(
            &mut self,
            token: &str,
            sample: &str,
            instance: &str,
            category: &str,
            translation: [f64; 3],
            wlh: [f64; 3],
        ) -> &mut Self {
            self.log.tables_mut().insert_annotation(SampleAnnotation {
                token: token.to_string(),
                sample_token: sample.to_string(),
                instance_token: instance.to_string(),
                translation,
                size: wlh,
                rotation: IDENTITY,
                category_name: category.to_string(),
                ..Default::default()
            });
            self
        }

        fn update_annotation(&mut self, token: &str, f: impl FnOnce(&mut SampleAnnotation)) {
            let mut ann = self.log.tables().sample_annotation(token).cloned().unwrap();
            f(&mut ann);
            self.log.tables_mut().insert_annotation(ann);
        }

        pub fn rotate_annotation(&mut self, token: &str, rotation: [f64; 4]) -> &mut Self {
            self.update_annotation(token, |ann| ann.rotation = rotation);
            self
        }

        /// Chains annotations of one instance through prev/next.
        pub fn link_annotations(&mut self, tokens: &[&str]) -> &mut Self {
            for (i, token) in tokens.iter().enumerate() {
                let prev = if i > 0 { tokens[i - 1] } else { "" };
                let next = tokens.get(i + 1).copied().unwrap_or("");
                self.update_annotation(token, |ann| {
                    ann.prev = prev.to_string();
                    ann.next = next.to_string();
                });
            }
            self
        }

        pub fn attribute(&mut self, token: &str, name: &str) -> &mut Self {
            self.log.tables_mut().insert_attribute(AttributeRecord {
                token: token.to_string(),
                name: name.to_string(),
            });
            self
        }

        pub fn annotation_attributes(&mut self, token: &str, attributes: &[&str]) -> &mut Self {
            let tokens: Vec<String> = attributes.iter().map(|a| a.to_string()).collect();
            self.update_annotation(token, |ann| ann.attribute_tokens = tokens);
            self
        }

        /// Appends an older, non-key-frame sweep to a channel's sweep chain.
        pub fn sweep(&mut self, sample: &str, channel: &str, token: &str, timestamp: i64) -> &mut Self {
            let mut oldest = self
                .log
                .tables()
                .sample_data(&format!("sd_{}_{}", sample, channel))
                .cloned()
                .unwrap();
            while !oldest.prev.is_empty() {
                oldest = self.log.tables().sample_data(&oldest.prev).cloned().unwrap();
            }

            let record = SampleData {
                token: token.to_string(),
                timestamp,
                is_key_frame: false,
                next: oldest.token.clone(),
                prev: String::new(),
                ..oldest.clone()
            };
            oldest.prev = token.to_string();
            self.log.tables_mut().insert_sample_data(oldest);
            self.log.tables_mut().insert_sample_data(record);
            self
        }

        pub fn radar(&mut self, sample_data: &str, points: Vec<[f32; NUM_RADAR_FIELDS]>) -> &mut Self {
            self.log
                .insert_radar_points(sample_data, RadarPointCloud::from_points(points));
            self
        }

        pub fn build(&mut self) -> InMemoryLog {
            std::mem::take(&mut self.log)
        }
    }
}
