//! Data loaders for the log database tables and radar sweep files.
//!
//! This module provides:
//! - The 18-field radar point container shared by fusion and output
//! - A binary PCD parser for radar sweeps (with the standard state filters)
//! - [`NuScenesDb`], a [`LogDatabase`] backed by the JSON tables of one
//!   dataset version directory

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use log::{debug, info};
use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use thiserror::Error;

use super::database::{LogDatabase, LogTables, LookupError};
use super::records::{
    AttributeRecord, CalibratedSensor, CategoryRecord, EgoPose, Instance, Sample, SampleAnnotation,
    SampleData, Scene, Sensor,
};
use crate::config::RadarFilterConfig;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Table {table} references unknown {target} '{token}'")]
    DanglingReference {
        table: &'static str,
        target: &'static str,
        token: String,
    },

    #[error("Invalid PCD file: {0}")]
    InvalidPcd(String),

    #[error("Unsupported PCD field type {kind}{size}")]
    UnsupportedField { kind: String, size: usize },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Number of fields of one radar point.
pub const NUM_RADAR_FIELDS: usize = 18;

/// Positional field layout of a radar point.
pub const RADAR_FIELDS: [&str; NUM_RADAR_FIELDS] = [
    "x",
    "y",
    "z",
    "dyn_prop",
    "id",
    "rcs",
    "vx",
    "vy",
    "vx_comp",
    "vy_comp",
    "is_quality_valid",
    "ambig_state",
    "x_rms",
    "y_rms",
    "invalid_state",
    "pdh0",
    "vx_rms",
    "vy_rms",
];

const FIELD_DYN_PROP: usize = 3;
const FIELD_VX_COMP: usize = 8;
const FIELD_VY_COMP: usize = 9;
const FIELD_AMBIG_STATE: usize = 11;
const FIELD_INVALID_STATE: usize = 14;

/// Container for radar points with the 18-field layout of [`RADAR_FIELDS`].
///
/// Serializes field-major, i.e. as 18 rows of N values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadarPointCloud {
    /// One entry per point, fields in [`RADAR_FIELDS`] order.
    pub points: Vec<[f32; NUM_RADAR_FIELDS]>,
}

impl RadarPointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Creates a new point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Creates a point cloud from points.
    pub fn from_points(points: Vec<[f32; NUM_RADAR_FIELDS]>) -> Self {
        Self { points }
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(fields, points)`, the shape of the field-major matrix.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (NUM_RADAR_FIELDS, self.points.len())
    }

    /// Adds a point to the cloud.
    #[inline]
    pub fn push(&mut self, point: [f32; NUM_RADAR_FIELDS]) {
        self.points.push(point);
    }

    /// Appends all points of `other`, keeping their order.
    pub fn append(&mut self, other: RadarPointCloud) {
        self.points.extend(other.points);
    }

    /// Values of one field across all points.
    pub fn field(&self, index: usize) -> Vec<f32> {
        self.points.iter().map(|p| p[index]).collect()
    }

    /// Positions as `[x, y, z]`.
    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.points
            .iter()
            .map(|p| Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64))
            .collect()
    }

    /// Applies a homogeneous transform to the point positions.
    pub fn transform(&mut self, m: &Matrix4<f64>) {
        for p in &mut self.points {
            let v = super::transforms::transform_point(m, &Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64));
            p[0] = v.x as f32;
            p[1] = v.y as f32;
            p[2] = v.z as f32;
        }
    }

    /// Rotates the compensated ground-plane velocity into a new frame.
    ///
    /// `(vx_comp, vy_comp, 0)` is rotated and its x and z components are
    /// written back, the ground-plane axes of a camera frame.
    pub fn rotate_velocity(&mut self, rotation: &Matrix3<f64>) {
        for p in &mut self.points {
            let v = rotation * Vector3::new(p[FIELD_VX_COMP] as f64, p[FIELD_VY_COMP] as f64, 0.0);
            p[FIELD_VX_COMP] = v.x as f32;
            p[FIELD_VY_COMP] = v.z as f32;
        }
    }

    /// Removes points within `radius` of the origin in the xy plane.
    pub fn remove_close(&mut self, radius: f32) {
        self.points
            .retain(|p| !(p[0].abs() < radius && p[1].abs() < radius));
    }

    /// Keeps the points whose state fields are all accepted by `filters`.
    pub fn apply_filters(&mut self, filters: &RadarFilterConfig) {
        if filters.disabled {
            return;
        }
        let accepts = |states: &[i32], value: f32| states.contains(&(value as i32));
        self.points.retain(|p| {
            accepts(&filters.invalid_states, p[FIELD_INVALID_STATE])
                && accepts(&filters.dynprop_states, p[FIELD_DYN_PROP])
                && accepts(&filters.ambig_states, p[FIELD_AMBIG_STATE])
        });
    }
}

impl Serialize for RadarPointCloud {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut rows = serializer.serialize_seq(Some(NUM_RADAR_FIELDS))?;
        for field in 0..NUM_RADAR_FIELDS {
            rows.serialize_element(&self.field(field))?;
        }
        rows.end()
    }
}

/// Decoded PCD header.
#[derive(Debug, Clone)]
struct PcdHeader {
    sizes: Vec<usize>,
    types: Vec<String>,
    width: usize,
}

fn parse_pcd_header(meta: &[String]) -> Result<PcdHeader> {
    let mut sizes = None;
    let mut types = None;
    let mut counts: Option<Vec<String>> = None;
    let mut width = None;
    let mut height = None;
    let mut data = None;

    for line in meta {
        let mut parts = line.split_whitespace();
        let key = parts.next().unwrap_or_default();
        let values: Vec<String> = parts.map(str::to_string).collect();
        match key {
            "SIZE" => {
                sizes = Some(
                    values
                        .iter()
                        .map(|v| v.parse::<usize>())
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|_| LoaderError::InvalidPcd(format!("bad SIZE line: {}", line)))?,
                )
            }
            "TYPE" => types = Some(values),
            "COUNT" => counts = Some(values),
            "WIDTH" => width = values.first().and_then(|v| v.parse::<usize>().ok()),
            "HEIGHT" => height = values.first().and_then(|v| v.parse::<usize>().ok()),
            "DATA" => data = values.first().cloned(),
            _ => {}
        }
    }

    let sizes = sizes.ok_or_else(|| LoaderError::InvalidPcd("missing SIZE".to_string()))?;
    let types = types.ok_or_else(|| LoaderError::InvalidPcd("missing TYPE".to_string()))?;
    let width = width.ok_or_else(|| LoaderError::InvalidPcd("missing WIDTH".to_string()))?;

    if sizes.iter().any(|&size| size == 0) {
        return Err(LoaderError::InvalidPcd("field with SIZE 0".to_string()));
    }
    if sizes.len() != types.len() {
        return Err(LoaderError::InvalidPcd("SIZE and TYPE disagree".to_string()));
    }
    if sizes.len() != NUM_RADAR_FIELDS {
        return Err(LoaderError::InvalidPcd(format!(
            "expected {} fields, found {}",
            NUM_RADAR_FIELDS,
            sizes.len()
        )));
    }
    if counts.map_or(false, |c| c.iter().any(|v| v != "1")) {
        return Err(LoaderError::InvalidPcd("COUNT other than 1 is not supported".to_string()));
    }
    if height.unwrap_or(1) != 1 {
        return Err(LoaderError::InvalidPcd("HEIGHT other than 1 is not supported".to_string()));
    }
    if data.as_deref() != Some("binary") {
        return Err(LoaderError::InvalidPcd("only binary DATA is supported".to_string()));
    }

    Ok(PcdHeader { sizes, types, width })
}

fn decode_field(kind: &str, bytes: &[u8]) -> Result<f32> {
    let unsupported = || LoaderError::UnsupportedField {
        kind: kind.to_string(),
        size: bytes.len(),
    };
    let value = match (kind, bytes.len()) {
        ("F", 4) => f32::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?),
        ("F", 8) => f64::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?) as f32,
        ("I", 1) => bytes[0] as i8 as f32,
        ("I", 2) => i16::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?) as f32,
        ("I", 4) => i32::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?) as f32,
        ("I", 8) => i64::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?) as f32,
        ("U", 1) => bytes[0] as f32,
        ("U", 2) => u16::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?) as f32,
        ("U", 4) => u32::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?) as f32,
        ("U", 8) => u64::from_le_bytes(bytes.try_into().map_err(|_| unsupported())?) as f32,
        _ => return Err(unsupported()),
    };
    Ok(value)
}

/// Parse a binary radar PCD stream.
///
/// A NaN anywhere in the first point marks an empty sweep. NaN values in
/// later points are kept.
pub fn read_radar_pcd<R: Read>(reader: R) -> Result<RadarPointCloud> {
    let mut reader = BufReader::new(reader);
    let mut meta = Vec::new();
    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Err(LoaderError::InvalidPcd("missing DATA line".to_string()));
        }
        let line = String::from_utf8_lossy(&line).trim().to_string();
        let is_data = line.starts_with("DATA");
        meta.push(line);
        if is_data {
            break;
        }
    }

    if !meta.first().map_or(false, |l| l.starts_with('#')) {
        return Err(LoaderError::InvalidPcd("first line must be a comment".to_string()));
    }

    let header = parse_pcd_header(&meta)?;
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;

    let point_size: usize = header.sizes.iter().sum();
    let expected = point_size.checked_mul(header.width).ok_or_else(|| {
        LoaderError::InvalidPcd(format!("WIDTH {} is too large", header.width))
    })?;
    if body.len() < expected {
        return Err(LoaderError::InvalidPcd(format!(
            "expected {} bytes of point data, found {}",
            expected,
            body.len()
        )));
    }

    let mut cloud = RadarPointCloud::with_capacity(header.width);
    for chunk in body[..expected].chunks_exact(point_size) {
        let mut point = [0f32; NUM_RADAR_FIELDS];
        let mut offset = 0;
        for (field, (kind, &size)) in header.types.iter().zip(&header.sizes).enumerate() {
            point[field] = decode_field(kind, &chunk[offset..offset + size])?;
            offset += size;
        }
        cloud.push(point);
    }

    if cloud.points.first().map_or(false, |p| p.iter().any(|v| v.is_nan())) {
        return Ok(RadarPointCloud::new());
    }

    Ok(cloud)
}

/// Load a radar sweep from a binary PCD file and apply the state filters.
pub fn load_radar_pcd<P: AsRef<Path>>(path: P, filters: &RadarFilterConfig) -> Result<RadarPointCloud> {
    let file = File::open(path.as_ref())?;
    let mut cloud = read_radar_pcd(file)?;
    cloud.apply_filters(filters);
    Ok(cloud)
}

/// Load one JSON table (`<dir>/<name>.json`) as a list of records.
pub fn load_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>> {
    let path = dir.join(format!("{}.json", name));
    let file = File::open(&path)?;
    let rows: Vec<T> = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| LoaderError::Json { path: path.clone(), source })?;
    debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// File-backed log database of one dataset version.
pub struct NuScenesDb {
    root: PathBuf,
    version: String,
    filters: RadarFilterConfig,
    tables: LogTables,
}

impl NuScenesDb {
    /// Load the tables of `<root>/<version>/` and build the reverse indices.
    ///
    /// # Errors
    ///
    /// Returns an error if a table is missing or malformed, or if a record
    /// references a sensor, instance or category that does not exist.
    pub fn load<P: AsRef<Path>>(root: P, version: &str, filters: &RadarFilterConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dir = root.join(version);

        let sensors: Vec<Sensor> = load_table(&dir, "sensor")?;
        let calibrated: Vec<CalibratedSensor> = load_table(&dir, "calibrated_sensor")?;
        let categories: Vec<CategoryRecord> = load_table(&dir, "category")?;
        let instances: Vec<Instance> = load_table(&dir, "instance")?;

        let channel_of_sensor: HashMap<&str, &str> = sensors
            .iter()
            .map(|s| (s.token.as_str(), s.channel.as_str()))
            .collect();
        let mut channel_of_calibration: HashMap<String, String> = HashMap::new();
        for cs in &calibrated {
            let channel = channel_of_sensor.get(cs.sensor_token.as_str()).ok_or_else(|| {
                LoaderError::DanglingReference {
                    table: "calibrated_sensor",
                    target: "sensor",
                    token: cs.sensor_token.clone(),
                }
            })?;
            channel_of_calibration.insert(cs.token.clone(), channel.to_string());
        }

        let category_name: HashMap<&str, &str> = categories
            .iter()
            .map(|c| (c.token.as_str(), c.name.as_str()))
            .collect();
        let mut category_of_instance: HashMap<String, String> = HashMap::new();
        for inst in &instances {
            let name = category_name.get(inst.category_token.as_str()).ok_or_else(|| {
                LoaderError::DanglingReference {
                    table: "instance",
                    target: "category",
                    token: inst.category_token.clone(),
                }
            })?;
            category_of_instance.insert(inst.token.clone(), name.to_string());
        }

        let mut tables = LogTables::new();
        for scene in load_table::<Scene>(&dir, "scene")? {
            tables.insert_scene(scene);
        }
        for sample in load_table::<Sample>(&dir, "sample")? {
            tables.insert_sample(sample);
        }
        for mut record in load_table::<SampleData>(&dir, "sample_data")? {
            record.channel = channel_of_calibration
                .get(&record.calibrated_sensor_token)
                .cloned()
                .ok_or_else(|| LoaderError::DanglingReference {
                    table: "sample_data",
                    target: "calibrated_sensor",
                    token: record.calibrated_sensor_token.clone(),
                })?;
            tables.insert_sample_data(record);
        }
        for pose in load_table::<EgoPose>(&dir, "ego_pose")? {
            tables.insert_ego_pose(pose);
        }
        for cs in calibrated {
            tables.insert_calibrated_sensor(cs);
        }
        for mut ann in load_table::<SampleAnnotation>(&dir, "sample_annotation")? {
            ann.category_name = category_of_instance
                .get(&ann.instance_token)
                .cloned()
                .ok_or_else(|| LoaderError::DanglingReference {
                    table: "sample_annotation",
                    target: "instance",
                    token: ann.instance_token.clone(),
                })?;
            tables.insert_annotation(ann);
        }
        for attr in load_table::<AttributeRecord>(&dir, "attribute")? {
            tables.insert_attribute(attr);
        }

        info!(
            "Loaded {} with {} samples from {}",
            version,
            tables.len(),
            dir.display()
        );

        Ok(Self {
            root,
            version: version.to_string(),
            filters: filters.clone(),
            tables,
        })
    }

    /// Dataset root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded dataset version.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl LogDatabase for NuScenesDb {
    fn tables(&self) -> &LogTables {
        &self.tables
    }

    fn load_radar_points(&self, record: &SampleData) -> std::result::Result<RadarPointCloud, LookupError> {
        let path = self.root.join(&record.filename);
        load_radar_pcd(&path, &self.filters).map_err(|source| LookupError::Sweep { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const PCD_HEADER: &str = "# .PCD v0.7 - Point Cloud Data file format\n\
VERSION 0.7\n\
FIELDS x y z dyn_prop id rcs vx vy vx_comp vy_comp is_quality_valid ambig_state x_rms y_rms invalid_state pdh0 vx_rms vy_rms\n\
SIZE 4 4 4 1 2 4 4 4 4 4 1 1 1 1 1 1 1 1\n\
TYPE F F F I I F F F F F I I I I I I I I\n\
COUNT 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1\n";

    fn encode_point(xyz: [f32; 3], dyn_prop: i8, ambig: i8, invalid: i8) -> Vec<u8> {
        let mut bytes = Vec::new();
        for v in xyz {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(dyn_prop as u8);
        bytes.extend_from_slice(&7i16.to_le_bytes());
        for v in [5.0f32, 1.0, 2.0, 0.5, -0.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(1);
        bytes.push(ambig as u8);
        bytes.extend_from_slice(&[3, 3]);
        bytes.push(invalid as u8);
        bytes.extend_from_slice(&[1, 3, 3]);
        bytes
    }

    fn write_pcd(points: &[Vec<u8>]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PCD_HEADER.as_bytes()).unwrap();
        writeln!(file, "WIDTH {}", points.len()).unwrap();
        writeln!(file, "HEIGHT 1").unwrap();
        writeln!(file, "VIEWPOINT 0 0 0 1 0 0 0").unwrap();
        writeln!(file, "POINTS {}", points.len()).unwrap();
        writeln!(file, "DATA binary").unwrap();
        for p in points {
            file.write_all(p).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_radar_point_cloud_operations() {
        let mut cloud = RadarPointCloud::new();
        assert!(cloud.is_empty());
        assert_eq!(cloud.shape(), (18, 0));

        let mut p = [0f32; NUM_RADAR_FIELDS];
        p[0] = 10.0;
        cloud.push(p);
        p[0] = 0.5;
        cloud.push(p);
        assert_eq!(cloud.shape(), (18, 2));
        assert_eq!(cloud.field(0), vec![10.0, 0.5]);

        cloud.remove_close(1.0);
        assert_eq!(cloud.len(), 1);
    }

    #[test]
    fn test_transform_and_rotate_velocity() {
        let mut p = [0f32; NUM_RADAR_FIELDS];
        p[0] = 1.0;
        p[FIELD_VX_COMP] = 2.0;
        p[FIELD_VY_COMP] = 3.0;
        let mut cloud = RadarPointCloud::from_points(vec![p]);

        let mut m = Matrix4::identity();
        m[(2, 3)] = 5.0;
        cloud.transform(&m);
        assert_eq!(&cloud.points[0][..3], &[1.0, 0.0, 5.0]);

        // ego (x fwd, y left) to camera (x right, y down, z fwd)
        let rot = Matrix3::new(0.0, -1.0, 0.0, 0.0, 0.0, -1.0, 1.0, 0.0, 0.0);
        cloud.rotate_velocity(&rot);
        assert_eq!(cloud.points[0][FIELD_VX_COMP], -3.0);
        assert_eq!(cloud.points[0][FIELD_VY_COMP], 2.0);
    }

    #[test]
    fn test_serialize_field_major() {
        let mut p = [0f32; NUM_RADAR_FIELDS];
        p[0] = 1.0;
        p[17] = 2.0;
        let cloud = RadarPointCloud::from_points(vec![p, p, p]);
        let json = serde_json::to_value(&cloud).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 18);
        assert_eq!(rows[0].as_array().unwrap().len(), 3);
        assert_eq!(rows[17][2], 2.0);
    }

    #[test]
    fn test_read_radar_pcd() {
        let file = write_pcd(&[
            encode_point([10.0, 1.0, 0.0], 0, 3, 0),
            encode_point([20.0, -2.0, 0.0], 1, 3, 0),
        ]);

        let cloud = load_radar_pcd(file.path(), &RadarFilterConfig::default()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points[1][0], 20.0);
        assert_eq!(cloud.points[0][4], 7.0);
        assert_eq!(cloud.points[0][5], 5.0);
        assert_eq!(cloud.points[0][FIELD_VY_COMP], -0.5);
        assert_eq!(cloud.points[0][FIELD_AMBIG_STATE], 3.0);
    }

    #[test]
    fn test_filters_drop_invalid_states() {
        let file = write_pcd(&[
            encode_point([10.0, 1.0, 0.0], 0, 3, 0),
            encode_point([11.0, 1.0, 0.0], 7, 3, 0),
            encode_point([12.0, 1.0, 0.0], 0, 1, 0),
            encode_point([13.0, 1.0, 0.0], 0, 3, 4),
        ]);

        let filtered = load_radar_pcd(file.path(), &RadarFilterConfig::default()).unwrap();
        assert_eq!(filtered.field(0), vec![10.0]);

        let disabled = RadarFilterConfig {
            disabled: true,
            ..Default::default()
        };
        let unfiltered = load_radar_pcd(file.path(), &disabled).unwrap();
        assert_eq!(unfiltered.len(), 4);
    }

    #[test]
    fn test_nan_first_point_means_empty() {
        let file = write_pcd(&[encode_point([f32::NAN, 0.0, 0.0], 0, 3, 0)]);
        let cloud = load_radar_pcd(file.path(), &RadarFilterConfig::default()).unwrap();
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_nan_in_later_point_is_kept() {
        let file = write_pcd(&[
            encode_point([10.0, 1.0, 0.0], 0, 3, 0),
            encode_point([f32::NAN, 2.0, 0.0], 0, 3, 0),
        ]);
        let cloud = read_radar_pcd(File::open(file.path()).unwrap()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert!(cloud.points[1][0].is_nan());
    }

    fn header_with(size_line: &str, width: &str) -> Vec<u8> {
        format!(
            "# .PCD v0.7 - Point Cloud Data file format\n\
VERSION 0.7\n\
FIELDS x y z dyn_prop id rcs vx vy vx_comp vy_comp is_quality_valid ambig_state x_rms y_rms invalid_state pdh0 vx_rms vy_rms\n\
{}\n\
TYPE F F F I I F F F F F I I I I I I I I\n\
COUNT 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1\n\
WIDTH {}\n\
HEIGHT 1\n\
POINTS 1\n\
DATA binary\n",
            size_line, width
        )
        .into_bytes()
    }

    #[test]
    fn test_read_pcd_rejects_zero_size_fields() {
        let mut bytes = header_with("SIZE 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0", "1");
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(
            read_radar_pcd(bytes.as_slice()),
            Err(LoaderError::InvalidPcd(_))
        ));
    }

    #[test]
    fn test_read_pcd_rejects_oversized_width() {
        let mut bytes = header_with(
            "SIZE 4 4 4 1 2 4 4 4 4 4 1 1 1 1 1 1 1 1",
            &usize::MAX.to_string(),
        );
        bytes.extend_from_slice(&encode_point([10.0, 1.0, 0.0], 0, 3, 0));
        assert!(matches!(
            read_radar_pcd(bytes.as_slice()),
            Err(LoaderError::InvalidPcd(_))
        ));
    }

    #[test]
    fn test_truncated_pcd_is_rejected() {
        let mut point = encode_point([10.0, 1.0, 0.0], 0, 3, 0);
        point.truncate(10);
        let file = write_pcd(&[point]);
        assert!(matches!(
            load_radar_pcd(file.path(), &RadarFilterConfig::default()),
            Err(LoaderError::InvalidPcd(_))
        ));
    }

    fn write_json(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(format!("{}.json", name)), value.to_string()).unwrap();
    }

    #[test]
    fn test_nuscenes_db_builds_reverse_index() {
        use serde_json::json;

        let root = tempdir().unwrap();
        let dir = root.path().join("v1.0-mini");
        std::fs::create_dir_all(&dir).unwrap();

        write_json(&dir, "sensor", json!([{"token": "sn_cam", "channel": "CAM_FRONT", "modality": "camera"}]));
        write_json(&dir, "calibrated_sensor", json!([{
            "token": "cs_cam", "sensor_token": "sn_cam",
            "translation": [1.0, 0.0, 1.5], "rotation": [1.0, 0.0, 0.0, 0.0],
            "camera_intrinsic": [[1000.0, 0.0, 800.0], [0.0, 1000.0, 450.0], [0.0, 0.0, 1.0]]
        }]));
        write_json(&dir, "category", json!([{"token": "cat_car", "name": "vehicle.car"}]));
        write_json(&dir, "instance", json!([{"token": "inst_1", "category_token": "cat_car"}]));
        write_json(&dir, "scene", json!([{"token": "sc_1", "name": "scene-0103"}]));
        write_json(&dir, "sample", json!([{"token": "s_1", "timestamp": 1000, "scene_token": "sc_1", "prev": "", "next": ""}]));
        write_json(&dir, "sample_data", json!([{
            "token": "sd_1", "sample_token": "s_1", "ego_pose_token": "ep_1",
            "calibrated_sensor_token": "cs_cam", "timestamp": 1000, "filename": "samples/CAM_FRONT/a.jpg",
            "width": 1600, "height": 900, "is_key_frame": true, "prev": "", "next": ""
        }]));
        write_json(&dir, "ego_pose", json!([{"token": "ep_1", "translation": [0.0, 0.0, 0.0], "rotation": [1.0, 0.0, 0.0, 0.0], "timestamp": 1000}]));
        write_json(&dir, "sample_annotation", json!([{
            "token": "ann_1", "sample_token": "s_1", "instance_token": "inst_1",
            "attribute_tokens": ["attr_parked"], "translation": [10.0, 0.0, 1.0],
            "size": [2.0, 4.5, 1.6], "rotation": [1.0, 0.0, 0.0, 0.0], "prev": "", "next": ""
        }]));
        write_json(&dir, "attribute", json!([{"token": "attr_parked", "name": "vehicle.parked"}]));

        let db = NuScenesDb::load(root.path(), "v1.0-mini", &RadarFilterConfig::default()).unwrap();
        assert_eq!(db.version(), "v1.0-mini");

        let sample = db.sample("s_1").unwrap();
        assert_eq!(sample.data.get("CAM_FRONT").map(String::as_str), Some("sd_1"));
        assert_eq!(sample.anns, vec!["ann_1"]);
        assert_eq!(db.sample_data("sd_1").unwrap().channel, "CAM_FRONT");
        assert_eq!(db.sample_annotation("ann_1").unwrap().category_name, "vehicle.car");
        assert_eq!(db.attribute("attr_parked").unwrap().name, "vehicle.parked");
        assert_eq!(db.scene("sc_1").unwrap().name, "scene-0103");
    }

    #[test]
    fn test_nuscenes_db_missing_table() {
        let root = tempdir().unwrap();
        assert!(matches!(
            NuScenesDb::load(root.path(), "v1.0-mini", &RadarFilterConfig::default()),
            Err(LoaderError::Io(_))
        ));
    }
}
