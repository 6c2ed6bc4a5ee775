//! Canonical ordering of image records.
//!
//! Images are grouped per (video, sensor) and groups are emitted in ascending
//! `video_id * SEQUENCE_STRIDE + sensor_id` order, each group in frame order.

use std::collections::BTreeMap;

use crate::core::dataset::ImageRecord;

/// Key multiplier; sensor ids must stay below it.
pub const SEQUENCE_STRIDE: u32 = 20;

/// Grouping key of an image.
#[inline]
pub fn sequence_key(video_id: u32, sensor_id: u32) -> u64 {
    video_id as u64 * SEQUENCE_STRIDE as u64 + sensor_id as u64
}

/// Reorders images camera-grouped and time-ordered.
///
/// The result depends only on the set of images, not on their input order.
pub fn sequence_frames(images: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut groups: BTreeMap<u64, Vec<ImageRecord>> = BTreeMap::new();
    for image in images {
        groups
            .entry(sequence_key(image.video_id, image.sensor_id))
            .or_default()
            .push(image);
    }

    groups
        .into_values()
        .flat_map(|mut group| {
            group.sort_by_key(|image| image.frame_id);
            group
        })
        .collect()
}
