//! Uniform traversal over explicit and implicit tile hierarchies

mod context;
pub mod explicit;
pub mod implicit;
pub mod options;
pub mod traversed_tile;
pub mod traverser;

pub use explicit::ExplicitTraversedTile;
pub use implicit::ImplicitTraversedTile;
pub use options::{TraversalOptions, TraversalStats, Visit};
pub use traversed_tile::{TraversedContent, TraversedTile};
pub use traverser::{ROOT_PATH, TilesetTraverser};
