//! Core data types, log access and I/O operations.

pub mod boxes;
pub mod database;
pub mod dataset;
pub mod loaders;
pub mod memory;
pub mod records;
pub mod transforms;
pub mod writers;

pub use database::{LogDatabase, LogTables, LookupError};
pub use loaders::{LoaderError, NuScenesDb, RadarPointCloud};
pub use memory::InMemoryLog;
pub use writers::{write_dataset_json, write_radar_csv, WriteError};
