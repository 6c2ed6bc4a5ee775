//! Coordinate transformations and camera projection.
//!
//! All transforms are 4x4 homogeneous matrices with a `[0, 0, 0, 1]` last row.
//! Rotations arrive as `[w, x, y, z]` quaternions and are normalized before use.
//! Camera projection uses a 3x4 calibration matrix with the intrinsic in its
//! left 3x3 block.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Quaternion, UnitQuaternion, Vector2, Vector3, Vector4};

/// Builds a unit quaternion from `[w, x, y, z]` components.
#[inline]
pub fn quaternion_from_wxyz(q: &[f64; 4]) -> UnitQuaternion<f64> {
    UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
}

/// Homogeneous transform for a translation and rotation.
///
/// With `inverse = false` the matrix maps points from the child frame into the
/// parent frame (`p_parent = R p_child + t`). With `inverse = true` it maps the
/// other way (`p_child = R^T (p_parent - t)`).
///
/// # Example
///
/// ```
/// use nalgebra::{UnitQuaternion, Vector3};
/// use radar_camera_converter::core::transforms::transform_matrix;
///
/// let t = Vector3::new(1.0, 2.0, 3.0);
/// let m = transform_matrix(&t, &UnitQuaternion::identity(), false);
/// assert_eq!(m[(0, 3)], 1.0);
/// ```
pub fn transform_matrix(
    translation: &Vector3<f64>,
    rotation: &UnitQuaternion<f64>,
    inverse: bool,
) -> Matrix4<f64> {
    let rot = rotation.to_rotation_matrix().into_inner();
    let (rot, trans) = if inverse {
        let rot_inv = rot.transpose();
        let trans_inv = -(rot_inv * translation);
        (rot_inv, trans_inv)
    } else {
        (rot, *translation)
    };

    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rot);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&trans);
    m
}

/// Transform from a `[x, y, z]` translation and a `[w, x, y, z]` rotation record.
pub fn transform_from_record(translation: &[f64; 3], rotation: &[f64; 4], inverse: bool) -> Matrix4<f64> {
    transform_matrix(
        &Vector3::from(*translation),
        &quaternion_from_wxyz(rotation),
        inverse,
    )
}

/// Rotation-only transform of a record, translation forced to zero.
pub fn rotation_from_record(rotation: &[f64; 4]) -> Matrix4<f64> {
    transform_matrix(&Vector3::zeros(), &quaternion_from_wxyz(rotation), false)
}

/// Applies a homogeneous transform to a point (`w = 1`).
#[inline]
pub fn transform_point(m: &Matrix4<f64>, p: &Vector3<f64>) -> Vector3<f64> {
    let h = m * Vector4::new(p.x, p.y, p.z, 1.0);
    Vector3::new(h.x, h.y, h.z)
}

/// Applies a homogeneous transform to a direction (`w = 0`), ignoring translation.
#[inline]
pub fn transform_direction(m: &Matrix4<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    let h = m * Vector4::new(v.x, v.y, v.z, 0.0);
    Vector3::new(h.x, h.y, h.z)
}

/// Embeds a 3x3 intrinsic into a 3x4 calibration matrix with a zero last column.
pub fn calib_from_intrinsic(intrinsic: &Matrix3<f64>) -> Matrix3x4<f64> {
    let mut calib = Matrix3x4::zeros();
    calib.fixed_view_mut::<3, 3>(0, 0).copy_from(intrinsic);
    calib
}

/// Maps points through a 3x4 view matrix, optionally dividing by depth.
///
/// With `normalize = true` each output is `(u, v, 1)` image coordinates.
pub fn view_points(points: &[Vector3<f64>], view: &Matrix3x4<f64>, normalize: bool) -> Vec<Vector3<f64>> {
    points
        .iter()
        .map(|p| {
            let out = view * Vector4::new(p.x, p.y, p.z, 1.0);
            if normalize {
                out / out.z
            } else {
                out
            }
        })
        .collect()
}

/// Projects camera-frame points to pixel coordinates.
pub fn project_to_image(points: &[Vector3<f64>], calib: &Matrix3x4<f64>) -> Vec<Vector2<f64>> {
    view_points(points, calib, true)
        .into_iter()
        .map(|p| Vector2::new(p.x, p.y))
        .collect()
}

/// Eight camera-frame corners of a box given as `[h, w, l]` dimensions, a
/// bottom-center location and a yaw about the camera y axis.
///
/// Corners 0-3 lie on the bottom face, 4-7 on the top face (y grows downward).
pub fn compute_box_3d(dim: &[f64; 3], location: &[f64; 3], rotation_y: f64) -> [Vector3<f64>; 8] {
    let (s, c) = rotation_y.sin_cos();
    let rot = Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c);
    let (h, w, l) = (dim[0], dim[1], dim[2]);
    let x_corners = [l / 2.0, l / 2.0, -l / 2.0, -l / 2.0, l / 2.0, l / 2.0, -l / 2.0, -l / 2.0];
    let y_corners = [0.0, 0.0, 0.0, 0.0, -h, -h, -h, -h];
    let z_corners = [w / 2.0, -w / 2.0, -w / 2.0, w / 2.0, w / 2.0, -w / 2.0, -w / 2.0, w / 2.0];
    let loc = Vector3::from(*location);

    let mut corners = [Vector3::zeros(); 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        *corner = rot * Vector3::new(x_corners[i], y_corners[i], z_corners[i]) + loc;
    }
    corners
}

/// Wraps an angle into `(-pi, pi]` with a single 2*pi correction.
#[inline]
pub fn wrap_angle(angle: f64) -> f64 {
    if angle > PI {
        angle - 2.0 * PI
    } else if angle <= -PI {
        angle + 2.0 * PI
    } else {
        angle
    }
}

/// Observation angle from a yaw and the object's horizontal image position.
///
/// `x` is the object center column, `cx` and `fx` the principal point column
/// and focal length of the camera.
#[inline]
pub fn rot_y_to_alpha(rot_y: f64, x: f64, cx: f64, fx: f64) -> f64 {
    wrap_angle(rot_y - (x - cx).atan2(fx))
}

/// Row-major nested array of a 4x4 matrix.
pub fn rows4(m: &Matrix4<f64>) -> [[f64; 4]; 4] {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = m[(r, c)];
        }
    }
    rows
}

/// Row-major nested array of a 3x4 matrix.
pub fn rows3x4(m: &Matrix3x4<f64>) -> [[f64; 4]; 3] {
    let mut rows = [[0.0; 4]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = m[(r, c)];
        }
    }
    rows
}

/// Row-major nested array of a 3x3 matrix.
pub fn rows3(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    let mut rows = [[0.0; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = m[(r, c)];
        }
    }
    rows
}

/// Parses a row-major 3x3 matrix, `None` unless the input is exactly 3x3.
pub fn matrix3_from_rows(rows: &[Vec<f64>]) -> Option<Matrix3<f64>> {
    if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
        return None;
    }
    Some(Matrix3::from_fn(|r, c| rows[r][c]))
}
