//! Scene segmentation and per-split identity bookkeeping.
//!
//! A sample without a predecessor opens a new video. Opening a video resets the
//! per-sensor frame counters and the track registry, so frame ids and track ids
//! both restart at 1 within every scene.

use std::collections::HashMap;

use log::{info, warn};

use crate::core::dataset::VideoInfo;
use crate::core::records::Sample;

/// Per-scene mapping from object instance to track id.
///
/// Ids are handed out as `1..=N` in first-sighting order.
#[derive(Debug, Default, Clone)]
pub struct TrackRegistry {
    ids: HashMap<String, u32>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track id of an instance, allocating the next id on first sighting.
    pub fn get_or_assign(&mut self, instance_token: &str) -> u32 {
        let next = self.ids.len() as u32 + 1;
        *self.ids.entry(instance_token.to_string()).or_insert(next)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Mutable state of one split's conversion run.
///
/// Created fresh for every split and dropped once its document is written.
#[derive(Debug, Default)]
pub struct ConversionContext {
    videos: Vec<VideoInfo>,
    frame_ids: HashMap<String, u32>,
    tracks: TrackRegistry,
    num_images: u64,
    num_annotations: u64,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next sample of the stream. Returns true if it opened a video.
    ///
    /// A sample that claims a predecessor while no video is open (the stream
    /// started mid-scene) is treated as a boundary as well.
    pub fn observe_sample(&mut self, sample: &Sample, scene_name: &str) -> bool {
        if sample.has_predecessor() {
            if !self.videos.is_empty() {
                return false;
            }
            warn!(
                "Sample {} links to predecessor {} but no scene is open, starting a new video",
                sample.token, sample.prev
            );
        }

        let id = self.videos.len() as u32 + 1;
        info!("Scene {} -> video {}", scene_name, id);
        self.videos.push(VideoInfo {
            id,
            file_name: scene_name.to_string(),
        });
        self.frame_ids = sample.data.keys().map(|k| (k.clone(), 0)).collect();
        self.tracks.clear();
        true
    }

    /// Id of the open video, `None` before the first boundary.
    pub fn current_video_id(&self) -> Option<u32> {
        self.videos.last().map(|v| v.id)
    }

    /// Advances and returns the frame counter of a sensor.
    pub fn next_frame_id(&mut self, sensor: &str) -> u32 {
        let counter = self.frame_ids.entry(sensor.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn next_image_id(&mut self) -> u64 {
        self.num_images += 1;
        self.num_images
    }

    pub fn next_annotation_id(&mut self) -> u64 {
        self.num_annotations += 1;
        self.num_annotations
    }

    pub fn tracks_mut(&mut self) -> &mut TrackRegistry {
        &mut self.tracks
    }

    pub fn videos(&self) -> &[VideoInfo] {
        &self.videos
    }

    pub fn into_videos(self) -> Vec<VideoInfo> {
        self.videos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(token: &str, prev: &str, channels: &[&str]) -> Sample {
        Sample {
            token: token.to_string(),
            prev: prev.to_string(),
            data: channels
                .iter()
                .map(|c| (c.to_string(), format!("sd_{}_{}", token, c)))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_track_ids_contiguous_in_first_sighting_order() {
        let mut tracks = TrackRegistry::new();
        assert_eq!(tracks.get_or_assign("b"), 1);
        assert_eq!(tracks.get_or_assign("a"), 2);
        assert_eq!(tracks.get_or_assign("b"), 1);
        assert_eq!(tracks.get_or_assign("c"), 3);
        assert_eq!(tracks.len(), 3);
    }

    #[test]
    fn test_boundary_opens_video_and_resets() {
        let mut ctx = ConversionContext::new();
        assert_eq!(ctx.current_video_id(), None);

        assert!(ctx.observe_sample(&sample("s1", "", &["CAM_FRONT"]), "scene-0001"));
        assert_eq!(ctx.next_frame_id("CAM_FRONT"), 1);
        assert_eq!(ctx.tracks_mut().get_or_assign("inst"), 1);
        assert_eq!(ctx.tracks_mut().get_or_assign("other"), 2);

        assert!(!ctx.observe_sample(&sample("s2", "s1", &["CAM_FRONT"]), "scene-0001"));
        assert_eq!(ctx.next_frame_id("CAM_FRONT"), 2);
        assert_eq!(ctx.current_video_id(), Some(1));

        assert!(ctx.observe_sample(&sample("s3", "", &["CAM_FRONT"]), "scene-0002"));
        assert_eq!(ctx.current_video_id(), Some(2));
        assert_eq!(ctx.next_frame_id("CAM_FRONT"), 1);
        assert!(ctx.tracks_mut().is_empty());
        assert_eq!(ctx.tracks_mut().get_or_assign("other"), 1);

        let names: Vec<&str> = ctx.videos().iter().map(|v| v.file_name.as_str()).collect();
        assert_eq!(names, vec!["scene-0001", "scene-0002"]);
    }

    #[test]
    fn test_orphan_sample_starts_implicit_video() {
        let mut ctx = ConversionContext::new();
        assert!(ctx.observe_sample(&sample("s5", "s4", &["CAM_BACK"]), "scene-0009"));
        assert_eq!(ctx.current_video_id(), Some(1));
        assert_eq!(ctx.next_frame_id("CAM_BACK"), 1);
    }

    #[test]
    fn test_frame_counters_are_per_sensor() {
        let mut ctx = ConversionContext::new();
        ctx.observe_sample(&sample("s1", "", &["CAM_FRONT", "CAM_BACK"]), "scene-0001");
        assert_eq!(ctx.next_frame_id("CAM_FRONT"), 1);
        assert_eq!(ctx.next_frame_id("CAM_FRONT"), 2);
        assert_eq!(ctx.next_frame_id("CAM_BACK"), 1);
    }

    #[test]
    fn test_image_and_annotation_ids_span_videos() {
        let mut ctx = ConversionContext::new();
        ctx.observe_sample(&sample("s1", "", &[]), "scene-0001");
        assert_eq!(ctx.next_image_id(), 1);
        assert_eq!(ctx.next_annotation_id(), 1);
        ctx.observe_sample(&sample("s2", "", &[]), "scene-0002");
        assert_eq!(ctx.next_image_id(), 2);
        assert_eq!(ctx.next_annotation_id(), 2);
        assert_eq!(ctx.into_videos().len(), 2);
    }
}
