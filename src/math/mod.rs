//! Mathematical utilities: Morton indexing and bounding volumes

pub mod morton;
pub mod bounding_volume;

pub use bounding_volume::{Volume, transform_from_json};
