//! Derivation of annotation records from camera-frame boxes.

use log::{debug, warn};
use nalgebra::Vector3;
use thiserror::Error;

use super::frames::FrameTransforms;
use super::segmenter::ConversionContext;
use crate::core::boxes::{box_velocity, project_box_to_image, SensorBox};
use crate::core::database::{LogDatabase, LookupError};
use crate::core::dataset::{AnnotationRecord, Attribute, Category};
use crate::core::transforms::{project_to_image, rot_y_to_alpha};

/// Errors that abort annotation derivation.
#[derive(Error, Debug)]
pub enum DeriveError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("annotation {annotation} has unknown attribute '{name}'")]
    UnknownAttribute { annotation: String, name: String },

    #[error("velocity transform of image {0} is singular")]
    SingularTransform(u64),
}

/// Boxes skipped or flagged while deriving annotations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DerivationStats {
    /// Category outside the detection taxonomy
    pub uncategorized: usize,
    /// No part of the box projects into the image
    pub unprojectable: usize,
    /// More than one attribute, only the first was kept
    pub multi_attribute: usize,
}

impl DerivationStats {
    pub fn merge(&mut self, other: &DerivationStats) {
        self.uncategorized += other.uncategorized;
        self.unprojectable += other.unprojectable;
        self.multi_attribute += other.multi_attribute;
    }
}

/// Attribute of an annotation: its first attribute, or none.
fn first_attribute<D: LogDatabase + ?Sized>(
    db: &D,
    annotation_token: &str,
    attribute_tokens: &[String],
    stats: &mut DerivationStats,
) -> Result<Attribute, DeriveError> {
    let names = attribute_tokens
        .iter()
        .map(|t| db.attribute(t).map(|a| a.name.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    if names.len() > 1 {
        warn!(
            "Annotation {} has {} attributes {:?}, keeping the first",
            annotation_token,
            names.len(),
            names
        );
        stats.multi_attribute += 1;
    }

    let name = names.first().copied().unwrap_or("");
    Attribute::from_name(name).ok_or_else(|| DeriveError::UnknownAttribute {
        annotation: annotation_token.to_string(),
        name: name.to_string(),
    })
}

/// Derives the annotation records of one image from its visible boxes.
///
/// Boxes are handled in order. A box is skipped when its category is outside
/// the detection taxonomy or when its projection misses the image; ids and
/// track ids are only allocated for emitted records.
pub fn derive_annotations<D: LogDatabase + ?Sized>(
    db: &D,
    boxes: &[SensorBox],
    frame: &FrameTransforms,
    image_id: u64,
    reference_size: [u32; 2],
    ctx: &mut ConversionContext,
    stats: &mut DerivationStats,
) -> Result<Vec<AnnotationRecord>, DeriveError> {
    let k = &frame.camera_intrinsic;
    let mut records = Vec::with_capacity(boxes.len());

    for b in boxes {
        let Some(category) = Category::from_general_name(&b.name) else {
            debug!("Image {}: dropping {} box {}", image_id, b.name, b.token);
            stats.uncategorized += 1;
            continue;
        };

        let Some(corners) = project_box_to_image(b, k, reference_size) else {
            debug!("Image {}: box {} does not project into the image", image_id, b.token);
            stats.unprojectable += 1;
            continue;
        };

        let [width, length, height] = b.wlh;
        let rotation_y = b.camera_yaw();
        let location = b.center + Vector3::new(0.0, height / 2.0, 0.0);
        let amodel_center = project_to_image(&[b.center], &frame.calib)[0];

        let ann = db.sample_annotation(&b.token)?;
        let attribute = first_attribute(db, &ann.token, &ann.attribute_tokens, stats)?;
        let track_id = ctx.tracks_mut().get_or_assign(&ann.instance_token);

        let velocity = box_velocity(db, &b.token)?;
        let velocity_cam = frame
            .velocity_in_sensor(&velocity)
            .ok_or(DeriveError::SingularTransform(image_id))?;

        let [x1, y1, x2, y2] = corners;
        let alpha = rot_y_to_alpha(rotation_y, (x1 + x2) / 2.0, k[(0, 2)], k[(0, 0)]);

        records.push(AnnotationRecord {
            id: ctx.next_annotation_id(),
            image_id,
            category_id: category.id(),
            dim: [height, width, length],
            location: location.into(),
            depth: location.z,
            occluded: 0,
            truncated: 0,
            rotation_y,
            amodel_center: amodel_center.into(),
            iscrowd: 0,
            track_id,
            attributes: attribute.id(),
            velocity: velocity.into(),
            velocity_cam: velocity_cam.into(),
            bbox: [x1, y1, x2 - x1, y2 - y1],
            area: (x2 - x1) * (y2 - y1),
            alpha,
        });
    }

    Ok(records)
}
