//! Validated implicit tiling parameters

use crate::core::{Error, Result};
use crate::implicit::coordinates::{MAX_OCTREE_LEVEL, MAX_QUADTREE_LEVEL};
use crate::tileset::ImplicitTiling;

/// How each tile splits into children
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubdivisionScheme {
    /// 2D split, 4 children per tile
    Quadtree,
    /// 3D split, 8 children per tile
    Octree,
}

impl SubdivisionScheme {
    /// Parse the `subdivisionScheme` JSON string
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "QUADTREE" => Ok(Self::Quadtree),
            "OCTREE" => Ok(Self::Octree),
            other => Err(Error::InvalidSubdivision(format!(
                "unknown subdivision scheme '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quadtree => "QUADTREE",
            Self::Octree => "OCTREE",
        }
    }

    /// Number of spatial axes that are split (2 or 3)
    pub fn dimensions(&self) -> u32 {
        match self {
            Self::Quadtree => 2,
            Self::Octree => 3,
        }
    }

    /// Number of children per tile (4 or 8)
    pub fn branching(&self) -> u64 {
        1 << self.dimensions()
    }

    /// Deepest level whose coordinates still fit the index types
    pub fn max_level(&self) -> u32 {
        match self {
            Self::Quadtree => MAX_QUADTREE_LEVEL,
            Self::Octree => MAX_OCTREE_LEVEL,
        }
    }

    /// Nodes at exactly `level` (`branching^level`)
    pub fn nodes_in_level(&self, level: u32) -> u64 {
        1u64 << (self.dimensions() * level)
    }

    /// Nodes in levels `[0, levels)` (`sum of branching^l`)
    pub fn nodes_in_levels(&self, levels: u32) -> u64 {
        (self.nodes_in_level(levels) - 1) / (self.branching() - 1)
    }
}

/// An `implicitTiling` object after validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplicitTilingInfo {
    pub scheme: SubdivisionScheme,
    /// Levels stored in each subtree file
    pub subtree_levels: u32,
    /// Levels of the whole implicit tree; tiles live in `[0, available_levels)`
    pub available_levels: u32,
    /// Template URI for subtree files
    pub subtrees_uri: String,
}

impl ImplicitTilingInfo {
    /// Validate the raw JSON parameters
    pub fn from_json(tiling: &ImplicitTiling) -> Result<Self> {
        let scheme = SubdivisionScheme::parse(&tiling.subdivision_scheme)?;
        let level_param = |name: &str, value: i64| -> Result<u32> {
            if value < 1 {
                return Err(Error::InvalidSubdivision(format!(
                    "{} must be positive, found {}",
                    name, value
                )));
            }
            u32::try_from(value)
                .ok()
                .filter(|v| *v <= scheme.max_level() + 1)
                .ok_or_else(|| {
                    Error::InvalidSubdivision(format!(
                        "{} of {} exceeds the supported depth for {}",
                        name,
                        value,
                        scheme.as_str()
                    ))
                })
        };
        let subtree_levels = level_param("subtreeLevels", tiling.subtree_levels)?;
        let available_levels = level_param("availableLevels", tiling.available_levels)?;
        if tiling.subtrees.uri.is_empty() {
            return Err(Error::InvalidSubdivision("subtrees.uri is empty".into()));
        }

        Ok(Self {
            scheme,
            subtree_levels,
            available_levels,
            subtrees_uri: tiling.subtrees.uri.clone(),
        })
    }
}
