//! Output records of a converted split.
//!
//! One [`Dataset`] is written per split as a single JSON document. Key names
//! and array shapes are consumed verbatim by the training pipeline.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::loaders::RadarPointCloud;

/// The closed set of detection categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Car = 1,
    Truck = 2,
    Bus = 3,
    Trailer = 4,
    ConstructionVehicle = 5,
    Pedestrian = 6,
    Motorcycle = 7,
    Bicycle = 8,
    TrafficCone = 9,
    Barrier = 10,
}

impl Category {
    /// All categories in id order.
    pub const ALL: [Category; 10] = [
        Category::Car,
        Category::Truck,
        Category::Bus,
        Category::Trailer,
        Category::ConstructionVehicle,
        Category::Pedestrian,
        Category::Motorcycle,
        Category::Bicycle,
        Category::TrafficCone,
        Category::Barrier,
    ];

    #[inline]
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Car => "car",
            Category::Truck => "truck",
            Category::Bus => "bus",
            Category::Trailer => "trailer",
            Category::ConstructionVehicle => "construction_vehicle",
            Category::Pedestrian => "pedestrian",
            Category::Motorcycle => "motorcycle",
            Category::Bicycle => "bicycle",
            Category::TrafficCone => "traffic_cone",
            Category::Barrier => "barrier",
        }
    }

    /// Maps a general log category (e.g. `vehicle.bus.rigid`) to its
    /// detection category. Categories outside the detection taxonomy
    /// (animals, debris, parked bicycle racks, ...) map to `None`.
    pub fn from_general_name(name: &str) -> Option<Category> {
        let category = match name {
            "movable_object.barrier" => Category::Barrier,
            "vehicle.bicycle" => Category::Bicycle,
            "vehicle.bus.bendy" | "vehicle.bus.rigid" => Category::Bus,
            "vehicle.car" => Category::Car,
            "vehicle.construction" => Category::ConstructionVehicle,
            "vehicle.motorcycle" => Category::Motorcycle,
            "human.pedestrian.adult"
            | "human.pedestrian.child"
            | "human.pedestrian.construction_worker"
            | "human.pedestrian.police_officer" => Category::Pedestrian,
            "movable_object.trafficcone" => Category::TrafficCone,
            "vehicle.trailer" => Category::Trailer,
            "vehicle.truck" => Category::Truck,
            _ => return None,
        };
        Some(category)
    }
}

/// The closed set of object attributes. `None` stands for "no attribute".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Attribute {
    #[default]
    None = 0,
    CycleWithRider = 1,
    CycleWithoutRider = 2,
    PedestrianMoving = 3,
    PedestrianStanding = 4,
    PedestrianSittingLyingDown = 5,
    VehicleMoving = 6,
    VehicleParked = 7,
    VehicleStopped = 8,
}

impl Attribute {
    /// All attributes in id order.
    pub const ALL: [Attribute; 9] = [
        Attribute::None,
        Attribute::CycleWithRider,
        Attribute::CycleWithoutRider,
        Attribute::PedestrianMoving,
        Attribute::PedestrianStanding,
        Attribute::PedestrianSittingLyingDown,
        Attribute::VehicleMoving,
        Attribute::VehicleParked,
        Attribute::VehicleStopped,
    ];

    #[inline]
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Attribute::None => "",
            Attribute::CycleWithRider => "cycle.with_rider",
            Attribute::CycleWithoutRider => "cycle.without_rider",
            Attribute::PedestrianMoving => "pedestrian.moving",
            Attribute::PedestrianStanding => "pedestrian.standing",
            Attribute::PedestrianSittingLyingDown => "pedestrian.sitting_lying_down",
            Attribute::VehicleMoving => "vehicle.moving",
            Attribute::VehicleParked => "vehicle.parked",
            Attribute::VehicleStopped => "vehicle.stopped",
        }
    }

    /// Exact inverse of [`Attribute::name`]; unknown names map to `None`
    /// (the Rust `Option`, not [`Attribute::None`]).
    pub fn from_name(name: &str) -> Option<Attribute> {
        Attribute::ALL.iter().copied().find(|a| a.name() == name)
    }
}

/// Serializes as the `name -> id` object of every attribute, in id order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeTable;

impl Serialize for AttributeTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Attribute::ALL.len()))?;
        for attribute in Attribute::ALL {
            map.serialize_entry(attribute.name(), &attribute.id())?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub name: String,
    pub id: u32,
}

/// One converted scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    pub id: u32,
    /// Scene name
    pub file_name: String,
}

/// One camera image of one sample.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub id: u64,
    pub file_name: String,
    /// 3x4 projection, intrinsic embedded in the left 3x3 block
    pub calib: [[f64; 4]; 3],
    pub video_id: u32,
    pub frame_id: u32,
    pub sensor_id: u32,
    pub sample_token: String,
    /// Global from sensor
    pub trans_matrix: [[f64; 4]; 4],
    /// Global from sensor, rotation only
    pub velocity_trans_matrix: [[f64; 4]; 4],
    pub width: u32,
    pub height: u32,
    pub pose_record_trans: [f64; 3],
    pub pose_record_rot: [f64; 4],
    pub cs_record_trans: [f64; 3],
    pub cs_record_rot: [f64; 4],
    /// Fused radar points in the camera frame, 18 rows of N values
    pub radar_pc: RadarPointCloud,
    pub camera_intrinsic: [[f64; 3]; 3],
}

/// One object observed in one image.
///
/// `velocity` is NaN when the object has no neighbouring annotation and is
/// then written as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationRecord {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    /// `[h, w, l]`
    pub dim: [f64; 3],
    pub location: [f64; 3],
    pub depth: f64,
    pub occluded: u8,
    pub truncated: u8,
    pub rotation_y: f64,
    pub amodel_center: [f64; 2],
    pub iscrowd: u8,
    pub track_id: u32,
    pub attributes: u32,
    pub velocity: [f64; 3],
    pub velocity_cam: [f64; 3],
    /// `[x, y, w, h]`
    pub bbox: [f64; 4],
    pub area: f64,
    pub alpha: f64,
}

/// The JSON document of one split.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
    pub categories: Vec<CategoryInfo>,
    pub videos: Vec<VideoInfo>,
    pub attributes: AttributeTable,
    /// Always empty
    pub pointclouds: Vec<serde_json::Value>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    /// Creates an empty dataset with the fixed category and attribute tables.
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            annotations: Vec::new(),
            categories: Category::ALL
                .iter()
                .map(|c| CategoryInfo {
                    name: c.name().to_string(),
                    id: c.id(),
                })
                .collect(),
            videos: Vec::new(),
            attributes: AttributeTable,
            pointclouds: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ids_are_contiguous() {
        for (i, c) in Category::ALL.iter().enumerate() {
            assert_eq!(c.id(), i as u32 + 1);
        }
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(Category::from_general_name("vehicle.bus.bendy"), Some(Category::Bus));
        assert_eq!(
            Category::from_general_name("human.pedestrian.police_officer"),
            Some(Category::Pedestrian)
        );
        assert_eq!(
            Category::from_general_name("movable_object.trafficcone"),
            Some(Category::TrafficCone)
        );
        assert_eq!(Category::from_general_name("animal"), None);
        assert_eq!(Category::from_general_name("human.pedestrian.stroller"), None);
        assert_eq!(Category::from_general_name("car"), None);
    }

    #[test]
    fn test_attribute_mapping() {
        assert_eq!(Attribute::from_name("vehicle.parked").map(Attribute::id), Some(7));
        assert_eq!(Attribute::from_name(""), Some(Attribute::None));
        assert_eq!(Attribute::default().id(), 0);
        assert_eq!(Attribute::from_name("vehicle.flying"), None);
        for a in Attribute::ALL {
            assert_eq!(Attribute::from_name(a.name()), Some(a));
        }
    }

    #[test]
    fn test_empty_dataset_document() {
        let json = serde_json::to_value(Dataset::new()).unwrap();

        assert_eq!(json["images"], serde_json::json!([]));
        assert_eq!(json["pointclouds"], serde_json::json!([]));
        assert_eq!(json["categories"].as_array().unwrap().len(), 10);
        assert_eq!(json["categories"][4]["name"], "construction_vehicle");
        assert_eq!(json["categories"][4]["id"], 5);
        assert_eq!(json["attributes"]["vehicle.stopped"], 8);
        assert_eq!(json["attributes"][""], 0);
    }

    #[test]
    fn test_attribute_table_keeps_id_order() {
        let text = serde_json::to_string(&AttributeTable).unwrap();
        let first = text.find("cycle.with_rider").unwrap();
        let last = text.find("vehicle.stopped").unwrap();
        assert!(text.starts_with("{\"\":0"));
        assert!(first < last);
    }

    #[test]
    fn test_nan_velocity_serializes_as_null() {
        let ann = AnnotationRecord {
            id: 1,
            image_id: 1,
            category_id: 1,
            dim: [1.5, 1.8, 4.2],
            location: [0.0, 0.75, 10.0],
            depth: 10.0,
            occluded: 0,
            truncated: 0,
            rotation_y: 0.0,
            amodel_center: [800.0, 450.0],
            iscrowd: 0,
            track_id: 1,
            attributes: 0,
            velocity: [f64::NAN; 3],
            velocity_cam: [f64::NAN; 3],
            bbox: [700.0, 400.0, 200.0, 100.0],
            area: 20000.0,
            alpha: 0.0,
        };
        let json = serde_json::to_value(&ann).unwrap();
        assert!(json["velocity"][0].is_null());
        assert_eq!(json["bbox"][2], 200.0);
        assert_eq!(json["amodel_center"][1], 450.0);
    }
}
