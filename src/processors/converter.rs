//! Split conversion: drives the per-frame stages over the sample stream of a
//! log and assembles the split document.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use indicatif::ProgressBar;
use log::{debug, info};

use super::annotations::{derive_annotations, DerivationStats};
use super::frames::compose_transforms;
use super::radar_fusion::fuse_radar_for_camera;
use super::segmenter::ConversionContext;
use super::sequencer::sequence_frames;
use super::visibility::filter_occluded;
use crate::config::ConverterConfig;
use crate::core::boxes::boxes_in_camera;
use crate::core::database::LogDatabase;
use crate::core::dataset::{AnnotationRecord, Dataset, ImageRecord};
use crate::core::records::Sample;
use crate::core::transforms::{rows3, rows3x4, rows4};
use crate::core::writers::write_dataset_json;
use crate::visualization::render_frame;

/// One camera image of a sample with its surviving annotations.
#[derive(Debug, Clone)]
pub struct ConvertedFrame {
    pub image: ImageRecord,
    pub annotations: Vec<AnnotationRecord>,
    /// Annotations removed by the occlusion filter
    pub hidden: usize,
}

/// Counters of one split conversion.
#[derive(Debug, Clone, Default)]
pub struct SplitSummary {
    pub split: String,
    pub samples: usize,
    /// Samples outside the split's scene list
    pub skipped_samples: usize,
    pub images: usize,
    pub annotations: usize,
    pub videos: usize,
    pub hidden: usize,
    pub stats: DerivationStats,
    pub output: Option<PathBuf>,
    pub duration: Duration,
}

/// A converted split, not yet written.
#[derive(Debug, Clone)]
pub struct ConvertedSplit {
    pub dataset: Dataset,
    pub summary: SplitSummary,
}

/// Converts the samples of a log database into split documents.
pub struct SplitConverter<'a, D: LogDatabase + ?Sized> {
    db: &'a D,
    config: &'a ConverterConfig,
    progress: Option<&'a ProgressBar>,
}

impl<'a, D: LogDatabase + ?Sized> SplitConverter<'a, D> {
    pub fn new(db: &'a D, config: &'a ConverterConfig) -> Self {
        Self {
            db,
            config,
            progress: None,
        }
    }

    /// Reports progress over samples on `pb`.
    pub fn with_progress(mut self, pb: &'a ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    /// Converts every sample of the log that belongs to `split`.
    ///
    /// Samples are consumed in log order. Any lookup failure aborts the split.
    /// Within a sample, cameras are visited in channel-name order, so image and
    /// annotation ids follow that order rather than the sample's record order.
    pub fn convert_split(&self, split: &str) -> Result<ConvertedSplit> {
        let start = Instant::now();
        let scenes = self.config.scenes_for(split);
        let samples = self.db.samples();

        if let Some(pb) = self.progress {
            pb.set_length(samples.len() as u64);
        }

        let mut ctx = ConversionContext::new();
        let mut dataset = Dataset::new();
        let mut summary = SplitSummary {
            split: split.to_string(),
            ..Default::default()
        };

        for sample in samples {
            if let Some(pb) = self.progress {
                pb.inc(1);
            }

            let scene = self
                .db
                .scene(&sample.scene_token)
                .with_context(|| format!("Failed to resolve scene of sample {}", sample.token))?;
            if let Some(allowed) = scenes {
                if !allowed.iter().any(|name| *name == scene.name) {
                    summary.skipped_samples += 1;
                    continue;
                }
            }
            summary.samples += 1;
            ctx.observe_sample(sample, &scene.name);

            for channel in sample.data.keys() {
                if !self.config.sensors.is_used(channel) {
                    continue;
                }

                let frame = self
                    .derive_frame(sample, channel, &mut ctx, &mut summary.stats)
                    .with_context(|| format!("Failed to convert {} of sample {}", channel, sample.token))?;
                summary.hidden += frame.hidden;

                if self.config.debug {
                    let path = self
                        .config
                        .output_dir()
                        .join("debug")
                        .join(format!("{}_{}.png", split, frame.image.id));
                    render_frame(&path, &frame.image, &frame.annotations)
                        .with_context(|| format!("Failed to render {}", path.display()))?;
                }

                dataset.images.push(frame.image);
                dataset.annotations.extend(frame.annotations);
            }
        }

        dataset.images = sequence_frames(dataset.images);
        dataset.videos = ctx.into_videos();

        summary.images = dataset.images.len();
        summary.annotations = dataset.annotations.len();
        summary.videos = dataset.videos.len();
        summary.duration = start.elapsed();

        info!(
            "Split {}: {} images, {} annotations, {} videos",
            split, summary.images, summary.annotations, summary.videos
        );
        if summary.stats.uncategorized > 0 || summary.stats.unprojectable > 0 {
            info!(
                "Split {}: dropped {} uncategorized and {} unprojectable boxes, {} hidden",
                split, summary.stats.uncategorized, summary.stats.unprojectable, summary.hidden
            );
        }

        Ok(ConvertedSplit { dataset, summary })
    }

    /// Converts `split` and writes it to `<output_dir>/<split>.json`.
    pub fn write_split(&self, split: &str) -> Result<SplitSummary> {
        let ConvertedSplit { dataset, mut summary } = self.convert_split(split)?;

        let path = self.config.output_dir().join(format!("{}.json", split));
        info!("Writing {}", path.display());
        write_dataset_json(&path, &dataset)?;

        summary.output = Some(path);
        Ok(summary)
    }

    /// Converts one camera frame of one sample in isolation, as the first
    /// frame of a fresh scene.
    pub fn convert_frame(&self, sample_token: &str, camera: &str) -> Result<ConvertedFrame> {
        let sample = self.db.sample(sample_token)?;
        let scene = self.db.scene(&sample.scene_token)?;

        let mut ctx = ConversionContext::new();
        let mut first = sample.clone();
        first.prev.clear();
        ctx.observe_sample(&first, &scene.name);

        self.derive_frame(sample, camera, &mut ctx, &mut DerivationStats::default())
            .with_context(|| format!("Failed to convert {} of sample {}", camera, sample_token))
    }

    /// Runs the per-frame stages for one camera of a sample.
    fn derive_frame(
        &self,
        sample: &Sample,
        camera: &str,
        ctx: &mut ConversionContext,
        stats: &mut DerivationStats,
    ) -> Result<ConvertedFrame> {
        let image_id = ctx.next_image_id();

        let sd = self.db.sample_data_for(sample, camera)?;
        let cs = self.db.calibrated_sensor(&sd.calibrated_sensor_token)?;
        let pose = self.db.ego_pose(&sd.ego_pose_token)?;
        let transforms = compose_transforms(pose, cs)?;
        let (boxes, _) = boxes_in_camera(self.db, &sd.token)?;

        let video_id = ctx
            .current_video_id()
            .ok_or_else(|| anyhow!("Sample {} is not part of an open scene", sample.token))?;
        let frame_id = ctx.next_frame_id(camera);
        let sensor_id = self
            .config
            .sensors
            .id(camera)
            .ok_or_else(|| anyhow!("Sensor {} has no configured id", camera))?;

        let radar_pc = fuse_radar_for_camera(self.db, sample, camera, &self.config.radar)
            .with_context(|| format!("Failed to fuse radar for {}", camera))?;

        let image = ImageRecord {
            id: image_id,
            file_name: sd.filename.clone(),
            calib: rows3x4(&transforms.calib),
            video_id,
            frame_id,
            sensor_id,
            sample_token: sample.token.clone(),
            trans_matrix: rows4(&transforms.global_from_sensor),
            velocity_trans_matrix: rows4(&transforms.velocity_global_from_sensor),
            width: sd.width,
            height: sd.height,
            pose_record_trans: pose.translation,
            pose_record_rot: pose.rotation,
            cs_record_trans: cs.translation,
            cs_record_rot: cs.rotation,
            radar_pc,
            camera_intrinsic: rows3(&transforms.camera_intrinsic),
        };

        let derived = derive_annotations(
            self.db,
            &boxes,
            &transforms,
            image_id,
            self.config.annotation.reference_image_size,
            ctx,
            stats,
        )?;
        let num_derived = derived.len();
        let annotations = filter_occluded(derived);
        let hidden = num_derived - annotations.len();

        debug!(
            "Image {} ({} frame {}): {} boxes, {} annotations, {} hidden, {} radar points",
            image_id,
            camera,
            frame_id,
            boxes.len(),
            annotations.len(),
            hidden,
            image.radar_pc.len()
        );

        Ok(ConvertedFrame {
            image,
            annotations,
            hidden,
        })
    }
}
