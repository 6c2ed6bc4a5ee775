//! Composition of the sensor-to-global transforms of one camera frame.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Vector3};

use crate::core::database::LookupError;
use crate::core::records::{CalibratedSensor, EgoPose};
use crate::core::transforms::{
    calib_from_intrinsic, matrix3_from_rows, rotation_from_record, transform_direction,
    transform_from_record,
};

/// Transforms and intrinsics of one camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTransforms {
    /// Maps sensor-frame points into the global frame
    pub global_from_sensor: Matrix4<f64>,
    /// Rotation part of `global_from_sensor`, for velocities
    pub velocity_global_from_sensor: Matrix4<f64>,
    pub camera_intrinsic: Matrix3<f64>,
    pub calib: Matrix3x4<f64>,
}

impl FrameTransforms {
    /// Rotates a global-frame velocity into the sensor frame.
    ///
    /// `None` if the velocity transform is singular.
    pub fn velocity_in_sensor(&self, velocity: &Vector3<f64>) -> Option<Vector3<f64>> {
        let sensor_from_global = self.velocity_global_from_sensor.try_inverse()?;
        Some(transform_direction(&sensor_from_global, velocity))
    }
}

/// Composes `global_from_ego · ego_from_sensor` for positions and the same
/// chain with zero translations for velocities.
///
/// # Errors
///
/// Returns [`LookupError::MissingIntrinsic`] if the calibration carries no
/// 3x3 camera intrinsic.
pub fn compose_transforms(pose: &EgoPose, cs: &CalibratedSensor) -> Result<FrameTransforms, LookupError> {
    let global_from_ego = transform_from_record(&pose.translation, &pose.rotation, false);
    let ego_from_sensor = transform_from_record(&cs.translation, &cs.rotation, false);

    let velocity_global_from_ego = rotation_from_record(&pose.rotation);
    let velocity_ego_from_sensor = rotation_from_record(&cs.rotation);

    let camera_intrinsic = matrix3_from_rows(&cs.camera_intrinsic)
        .ok_or_else(|| LookupError::MissingIntrinsic(cs.token.clone()))?;

    Ok(FrameTransforms {
        global_from_sensor: global_from_ego * ego_from_sensor,
        velocity_global_from_sensor: velocity_global_from_ego * velocity_ego_from_sensor,
        camera_intrinsic,
        calib: calib_from_intrinsic(&camera_intrinsic),
    })
}
