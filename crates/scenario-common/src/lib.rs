//! Common types shared by the scenario engine, the job queue and the worker.

pub mod bbox;
pub mod classes;
pub mod crs;
pub mod histogram;

pub use bbox::BoundingBox;
pub use classes::{ClassEntry, Color};
pub use crs::{AlbersEqualArea, CrsCode, CrsParseError, Datum, SpatialReference};
pub use histogram::ClassHistogram;
