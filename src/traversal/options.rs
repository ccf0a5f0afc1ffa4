//! Traversal configuration, visit control and statistics

use serde::{Deserialize, Serialize};

/// Traversal configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraversalOptions {
    /// Depth-first pre-order when true, level by level otherwise.
    pub depth_first: bool,
    /// Follow content URIs that point at other tileset JSON files.
    pub traverse_external_tilesets: bool,
    /// Do not expand tiles at or below this depth.
    pub max_depth: Option<u32>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            depth_first: true,
            traverse_external_tilesets: false,
            max_depth: None,
        }
    }
}

/// What the traverser does after visiting a tile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visit {
    /// Visit the tile's children
    #[default]
    Continue,
    /// Leave the tile's children out, keep going with its siblings
    SkipChildren,
    /// End the whole traversal
    Stop,
}

impl From<bool> for Visit {
    fn from(traverse_children: bool) -> Self {
        if traverse_children {
            Self::Continue
        } else {
            Self::SkipChildren
        }
    }
}

/// Counters for one traversal call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Tiles passed to the visitor
    pub visited: usize,
    /// Tiles whose children the visitor skipped
    pub skipped: usize,
    /// Subtree files loaded
    pub subtrees_loaded: usize,
    /// External tilesets loaded
    pub external_tilesets_loaded: usize,
    /// The visitor asked to stop
    pub stopped: bool,
}
