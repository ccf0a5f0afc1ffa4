//! Tiletrav - lazy traversal of explicit and implicit 3D Tiles hierarchies

pub mod core;
pub mod math;
pub mod implicit;
pub mod tileset;
pub mod traversal;

pub use crate::core::{Error, Result};
pub use crate::traversal::{TilesetTraverser, TraversalOptions, TraversedTile, Visit};
