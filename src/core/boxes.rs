//! 3D object boxes and their relation to a camera.
//!
//! Boxes are read from the annotation table in the global frame and moved into
//! a sensor frame via the ego pose and the sensor calibration. `wlh` is
//! `[width, length, height]`; the box's forward axis is its local x axis.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use super::database::{LogDatabase, LookupError, Result};
use super::records::SampleAnnotation;
use super::transforms::{calib_from_intrinsic, matrix3_from_rows, quaternion_from_wxyz, view_points};

/// Longest time span (seconds) between two annotations used for a velocity
/// estimate. Doubled when both neighbours exist.
pub const MAX_VELOCITY_TIME_DIFF: f64 = 1.5;

/// Corners with a depth at or below this are not counted as visible.
const MIN_VISIBLE_DEPTH: f64 = 1.0;

/// A 3D box in some frame, with the annotation it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorBox {
    pub center: Vector3<f64>,
    pub wlh: [f64; 3],
    pub orientation: UnitQuaternion<f64>,
    /// General category name
    pub name: String,
    /// Source annotation token
    pub token: String,
}

impl SensorBox {
    /// The annotation's box in the global frame.
    pub fn from_annotation(ann: &SampleAnnotation) -> Self {
        Self {
            center: Vector3::from(ann.translation),
            wlh: ann.size,
            orientation: quaternion_from_wxyz(&ann.rotation),
            name: ann.category_name.clone(),
            token: ann.token.clone(),
        }
    }

    #[inline]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.orientation.to_rotation_matrix().into_inner()
    }

    #[inline]
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        self.center += offset;
    }

    /// Rotates the box about the frame origin.
    pub fn rotate(&mut self, rotation: &UnitQuaternion<f64>) {
        self.center = rotation * self.center;
        self.orientation = rotation * self.orientation;
    }

    /// Corners 0-3 face forward (+x), 4-7 backward.
    pub fn corners(&self) -> [Vector3<f64>; 8] {
        let [w, l, h] = self.wlh;
        let x = [1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        let y = [1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0];
        let z = [1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0];
        let rot = self.rotation_matrix();

        let mut corners = [Vector3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let local = Vector3::new(x[i] * l / 2.0, y[i] * w / 2.0, z[i] * h / 2.0);
            *corner = rot * local + self.center;
        }
        corners
    }

    /// Yaw about the camera y axis, from the rotated forward axis.
    pub fn camera_yaw(&self) -> f64 {
        let forward = self.rotation_matrix() * Vector3::x();
        -forward.z.atan2(forward.x)
    }
}

/// Returns true if any corner projects inside the image while lying more than
/// one meter in front of the camera.
pub fn box_in_image(b: &SensorBox, intrinsic: &Matrix3<f64>, imsize: (u32, u32)) -> bool {
    let (width, height) = (imsize.0 as f64, imsize.1 as f64);
    let corners = b.corners();
    let projected = view_points(&corners, &calib_from_intrinsic(intrinsic), true);

    corners.iter().zip(&projected).any(|(c, p)| {
        p.x > 0.0 && p.x < width && p.y > 0.0 && p.y < height && c.z > MIN_VISIBLE_DEPTH
    })
}

/// 2D box `[x1, y1, x2, y2]` of the corners in front of the camera, clipped
/// to `imsize`. `None` when no corner is in front or the clipped box is empty.
pub fn project_box_to_image(b: &SensorBox, intrinsic: &Matrix3<f64>, imsize: [u32; 2]) -> Option<[f64; 4]> {
    let in_front: Vec<Vector3<f64>> = b.corners().into_iter().filter(|c| c.z > 0.0).collect();
    if in_front.is_empty() {
        return None;
    }

    let projected = view_points(&in_front, &calib_from_intrinsic(intrinsic), true);
    let mut bbox = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    for p in &projected {
        bbox[0] = bbox[0].min(p.x);
        bbox[1] = bbox[1].min(p.y);
        bbox[2] = bbox[2].max(p.x);
        bbox[3] = bbox[3].max(p.y);
    }

    let (width, height) = (imsize[0] as f64, imsize[1] as f64);
    let clipped = [
        bbox[0].clamp(0.0, width),
        bbox[1].clamp(0.0, height),
        bbox[2].clamp(0.0, width),
        bbox[3].clamp(0.0, height),
    ];
    if clipped[0] >= clipped[2] || clipped[1] >= clipped[3] {
        return None;
    }
    Some(clipped)
}

/// Annotated boxes of a camera key frame that are visible in its image,
/// expressed in the camera frame, together with the camera intrinsic.
///
/// Boxes keep the annotation order of the sample.
pub fn boxes_in_camera<D: LogDatabase + ?Sized>(
    db: &D,
    sample_data_token: &str,
) -> Result<(Vec<SensorBox>, Matrix3<f64>)> {
    let sd = db.sample_data(sample_data_token)?;
    let cs = db.calibrated_sensor(&sd.calibrated_sensor_token)?;
    let pose = db.ego_pose(&sd.ego_pose_token)?;
    let sample = db.sample(&sd.sample_token)?;

    let intrinsic = matrix3_from_rows(&cs.camera_intrinsic)
        .ok_or_else(|| LookupError::MissingIntrinsic(cs.token.clone()))?;

    let pose_translation = Vector3::from(pose.translation);
    let pose_rotation = quaternion_from_wxyz(&pose.rotation).inverse();
    let cs_translation = Vector3::from(cs.translation);
    let cs_rotation = quaternion_from_wxyz(&cs.rotation).inverse();

    let mut boxes = Vec::with_capacity(sample.anns.len());
    for token in &sample.anns {
        let mut b = SensorBox::from_annotation(db.sample_annotation(token)?);
        b.translate(&-pose_translation);
        b.rotate(&pose_rotation);
        b.translate(&-cs_translation);
        b.rotate(&cs_rotation);

        if box_in_image(&b, &intrinsic, (sd.width, sd.height)) {
            boxes.push(b);
        }
    }

    Ok((boxes, intrinsic))
}

/// Global-frame velocity of an annotated object, estimated from the
/// neighbouring annotations of the same instance.
///
/// NaN in every component when the object has no neighbour or when the
/// neighbours are too far apart in time.
pub fn box_velocity<D: LogDatabase + ?Sized>(db: &D, annotation_token: &str) -> Result<Vector3<f64>> {
    let current = db.sample_annotation(annotation_token)?;
    let has_prev = !current.prev.is_empty();
    let has_next = !current.next.is_empty();
    if !has_prev && !has_next {
        return Ok(Vector3::repeat(f64::NAN));
    }

    let first = if has_prev {
        db.sample_annotation(&current.prev)?
    } else {
        current
    };
    let last = if has_next {
        db.sample_annotation(&current.next)?
    } else {
        current
    };

    let position_diff = Vector3::from(last.translation) - Vector3::from(first.translation);
    let time_last = 1e-6 * db.sample(&last.sample_token)?.timestamp as f64;
    let time_first = 1e-6 * db.sample(&first.sample_token)?.timestamp as f64;
    let time_diff = time_last - time_first;

    let max_time_diff = if has_prev && has_next {
        2.0 * MAX_VELOCITY_TIME_DIFF
    } else {
        MAX_VELOCITY_TIME_DIFF
    };
    if time_diff > max_time_diff {
        return Ok(Vector3::repeat(f64::NAN));
    }
    Ok(position_diff / time_diff)
}
