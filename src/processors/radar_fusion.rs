//! Radar fusion: multi-sweep accumulation of the radars around a camera.
//!
//! Every sweep is moved from its own sensor frame at its own timestamp into the
//! reference camera frame at the key-frame timestamp, through the global frame.

use log::debug;
use nalgebra::Matrix4;
use rayon::prelude::*;

use crate::config::RadarConfig;
use crate::core::database::{LogDatabase, Result};
use crate::core::loaders::RadarPointCloud;
use crate::core::records::Sample;
use crate::core::transforms::{rotation_from_record, transform_from_record};

/// Accumulates up to `num_sweeps` sweeps of one radar channel, newest first,
/// expressed in the frame of `ref_channel`.
///
/// Points within `min_distance` of the radar (sensor frame, xy plane) are
/// dropped before transforming. Accumulation stops early at the first sweep
/// without predecessor.
pub fn load_multisweep<D: LogDatabase + ?Sized>(
    db: &D,
    sample: &Sample,
    radar_channel: &str,
    ref_channel: &str,
    num_sweeps: usize,
    min_distance: f32,
) -> Result<RadarPointCloud> {
    let ref_sd = db.sample_data_for(sample, ref_channel)?;
    let ref_pose = db.ego_pose(&ref_sd.ego_pose_token)?;
    let ref_cs = db.calibrated_sensor(&ref_sd.calibrated_sensor_token)?;

    let ref_from_car = transform_from_record(&ref_cs.translation, &ref_cs.rotation, true);
    let car_from_global = transform_from_record(&ref_pose.translation, &ref_pose.rotation, true);
    let ref_from_global = ref_from_car * car_from_global;
    let ref_from_global_rot: Matrix4<f64> =
        rotation_from_record(&ref_cs.rotation).transpose() * rotation_from_record(&ref_pose.rotation).transpose();

    let mut accumulated = RadarPointCloud::new();
    let mut current = db.sample_data_for(sample, radar_channel)?;
    for _ in 0..num_sweeps {
        let mut cloud = db.load_radar_points(current)?;
        cloud.remove_close(min_distance);

        let pose = db.ego_pose(&current.ego_pose_token)?;
        let cs = db.calibrated_sensor(&current.calibrated_sensor_token)?;
        let global_from_car = transform_from_record(&pose.translation, &pose.rotation, false);
        let car_from_current = transform_from_record(&cs.translation, &cs.rotation, false);
        let velocity_rot =
            ref_from_global_rot * rotation_from_record(&pose.rotation) * rotation_from_record(&cs.rotation);

        cloud.transform(&(ref_from_global * global_from_car * car_from_current));
        cloud.rotate_velocity(&velocity_rot.fixed_view::<3, 3>(0, 0).into_owned());
        accumulated.append(cloud);

        if current.prev.is_empty() {
            break;
        }
        current = db.sample_data(&current.prev)?;
    }

    Ok(accumulated)
}

/// Fused radar points of every radar associated with `camera`, in the camera
/// frame. Channels are loaded in parallel and concatenated in configured order.
pub fn fuse_radar_for_camera<D: LogDatabase + ?Sized>(
    db: &D,
    sample: &Sample,
    camera: &str,
    radar: &RadarConfig,
) -> Result<RadarPointCloud> {
    let channels = radar.radars_for(camera);
    let clouds: Vec<RadarPointCloud> = channels
        .par_iter()
        .map(|channel| load_multisweep(db, sample, channel, camera, radar.num_sweeps, radar.min_distance))
        .collect::<Result<Vec<_>>>()?;

    let mut fused = RadarPointCloud::with_capacity(clouds.iter().map(RadarPointCloud::len).sum());
    for (channel, cloud) in channels.iter().zip(clouds) {
        debug!("{} {}: {} radar points", camera, channel, cloud.len());
        fused.append(cloud);
    }
    Ok(fused)
}
