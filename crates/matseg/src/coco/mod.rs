//! COCO-style polygon export: raster-to-polygon conversion and dataset assembly.

pub mod converter;
pub mod dataset;

pub use converter::*;
pub use dataset::*;
