//! Debug rendering of converted frames.
//!
//! Draws the image plane of one frame as a PNG: fused radar points colored by
//! depth, 2D boxes, projected 3D box edges and amodal centers. Coordinates are
//! image pixels, so the plot can be laid over the camera image.

use std::path::Path;

use nalgebra::{Matrix3x4, Vector3};
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::dataset::{AnnotationRecord, ImageRecord};
use crate::core::transforms::{compute_box_3d, project_to_image};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Image {0} has zero size")]
    EmptyImage(u64),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Radar points closer than this (meters) are not drawn.
const MIN_POINT_DEPTH: f64 = 1.0;

/// Depth at which the point palette saturates.
const MAX_COLOR_DEPTH: f64 = 60.0;

/// Near to far color ramp for radar points.
const DEPTH_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),  // Red
    (255, 127, 0),  // Orange
    (255, 255, 51), // Yellow
    (77, 175, 74),  // Green
    (0, 206, 209),  // Turquoise
    (55, 126, 184), // Blue
    (138, 43, 226), // Blue Violet
];

const BOX_COLOR: RGBColor = RGBColor(0, 0, 255);
const BOX_3D_COLOR: RGBColor = RGBColor(0, 160, 0);
const CENTER_COLOR: RGBColor = RGBColor(255, 0, 255);

/// Edges of the eight-corner box layout of [`compute_box_3d`].
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

fn depth_color(depth: f64) -> RGBColor {
    let t = (depth / MAX_COLOR_DEPTH).clamp(0.0, 1.0);
    let idx = ((t * (DEPTH_COLORS.len() - 1) as f64).round() as usize).min(DEPTH_COLORS.len() - 1);
    let c = DEPTH_COLORS[idx];
    RGBColor(c.0, c.1, c.2)
}

fn calib_of(image: &ImageRecord) -> Matrix3x4<f64> {
    Matrix3x4::from_fn(|r, c| image.calib[r][c])
}

#[inline]
fn pixel(x: f64, y: f64) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

fn plotting<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Projected radar points of an image in front of the camera, with their depth.
pub fn radar_pixels(image: &ImageRecord) -> Vec<(f64, f64, f64)> {
    let calib = calib_of(image);
    let points: Vec<Vector3<f64>> = image
        .radar_pc
        .positions()
        .into_iter()
        .filter(|p| p.z > MIN_POINT_DEPTH)
        .collect();

    project_to_image(&points, &calib)
        .into_iter()
        .zip(&points)
        .map(|(uv, p)| (uv.x, uv.y, p.z))
        .collect()
}

/// Render one frame and its annotations to a PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `image` - The image record, with its calibration and fused radar points
/// * `annotations` - Annotations of this image
pub fn render_frame(output_path: &Path, image: &ImageRecord, annotations: &[AnnotationRecord]) -> Result<()> {
    if image.width == 0 || image.height == 0 {
        return Err(VisualizationError::EmptyImage(image.id));
    }
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let root = BitMapBackend::new(output_path, (image.width, image.height)).into_drawing_area();
    root.fill(&BLACK).map_err(plotting)?;

    for (u, v, depth) in radar_pixels(image) {
        root.draw(&Circle::new(pixel(u, v), 5, depth_color(depth).filled()))
            .map_err(plotting)?;
    }

    let calib = calib_of(image);
    for ann in annotations {
        let [x, y, w, h] = ann.bbox;
        root.draw(&Rectangle::new(
            [pixel(x, y), pixel(x + w, y + h)],
            BOX_COLOR.stroke_width(3),
        ))
        .map_err(plotting)?;

        let corners = compute_box_3d(&ann.dim, &ann.location, ann.rotation_y);
        if corners.iter().all(|c| c.z > MIN_POINT_DEPTH) {
            let projected = project_to_image(&corners, &calib);
            for (a, b) in BOX_EDGES {
                root.draw(&PathElement::new(
                    vec![pixel(projected[a].x, projected[a].y), pixel(projected[b].x, projected[b].y)],
                    BOX_3D_COLOR.stroke_width(2),
                ))
                .map_err(plotting)?;
            }
        }

        let [cx, cy] = ann.amodel_center;
        root.draw(&Cross::new(pixel(cx, cy), 6, CENTER_COLOR.stroke_width(2)))
            .map_err(plotting)?;
    }

    root.present().map_err(plotting)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::RadarPointCloud;
    use tempfile::tempdir;

    fn image_with_points(points: &[[f32; 3]]) -> ImageRecord {
        let cloud = RadarPointCloud::from_points(
            points
                .iter()
                .map(|xyz| {
                    let mut p = [0f32; 18];
                    p[..3].copy_from_slice(xyz);
                    p
                })
                .collect(),
        );
        ImageRecord {
            id: 7,
            file_name: "samples/CAM_FRONT/a.jpg".to_string(),
            calib: [
                [1000.0, 0.0, 800.0, 0.0],
                [0.0, 1000.0, 450.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            video_id: 1,
            frame_id: 1,
            sensor_id: 1,
            sample_token: "s1".to_string(),
            trans_matrix: [[0.0; 4]; 4],
            velocity_trans_matrix: [[0.0; 4]; 4],
            width: 160,
            height: 90,
            pose_record_trans: [0.0; 3],
            pose_record_rot: [1.0, 0.0, 0.0, 0.0],
            cs_record_trans: [0.0; 3],
            cs_record_rot: [1.0, 0.0, 0.0, 0.0],
            radar_pc: cloud,
            camera_intrinsic: [[1000.0, 0.0, 800.0], [0.0, 1000.0, 450.0], [0.0, 0.0, 1.0]],
        }
    }

    #[test]
    fn test_radar_pixels_skip_points_behind() {
        let image = image_with_points(&[[1.0, 0.0, 10.0], [0.0, 0.0, -5.0], [0.0, 0.0, 0.5]]);
        let pixels = radar_pixels(&image);
        assert_eq!(pixels.len(), 1);
        assert!((pixels[0].0 - 900.0).abs() < 1e-6);
        assert!((pixels[0].1 - 450.0).abs() < 1e-6);
        assert!((pixels[0].2 - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_depth_color_ramp() {
        let near = depth_color(0.0);
        assert_eq!((near.0, near.1, near.2), (228, 26, 28));
        let far = depth_color(1000.0);
        assert_eq!((far.0, far.1, far.2), (138, 43, 226));
    }

    #[test]
    fn test_render_frame_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("debug").join("frame.png");
        let image = image_with_points(&[[0.0, 0.0, 20.0]]);
        let ann = AnnotationRecord {
            id: 1,
            image_id: 7,
            category_id: 1,
            dim: [1.5, 1.8, 4.2],
            location: [0.0, 0.75, 20.0],
            depth: 20.0,
            occluded: 0,
            truncated: 0,
            rotation_y: 0.3,
            amodel_center: [800.0, 450.0],
            iscrowd: 0,
            track_id: 1,
            attributes: 0,
            velocity: [f64::NAN; 3],
            velocity_cam: [f64::NAN; 3],
            bbox: [10.0, 10.0, 50.0, 30.0],
            area: 1500.0,
            alpha: 0.3,
        };

        render_frame(&path, &image, &[ann]).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_render_frame_rejects_zero_size() {
        let dir = tempdir().unwrap();
        let mut image = image_with_points(&[]);
        image.width = 0;
        assert!(matches!(
            render_frame(&dir.path().join("x.png"), &image, &[]),
            Err(VisualizationError::EmptyImage(7))
        ));
    }
}
