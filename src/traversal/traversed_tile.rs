//! The uniform traversed tile
//!
//! A [`TraversedTile`] is a transient view of one tree node. Explicit tiles
//! wrap literal JSON; implicit tiles are synthesized from coordinates and a
//! subtree. Both answer the same questions, and children are produced on
//! demand rather than stored.

use std::sync::Arc;

use glam::DMat4;

use crate::core::Result;
use crate::implicit::TreeCoordinates;
use crate::math::Volume;
use crate::tileset::{Content, MetadataEntity, Refine, ResourceResolver, Tile};
use crate::traversal::context::TraversalContext;
use crate::traversal::explicit::ExplicitTraversedTile;
use crate::traversal::implicit::ImplicitTraversedTile;

/// A content reference of a traversed tile
#[derive(Clone, Debug, PartialEq)]
pub struct TraversedContent {
    /// Resolved URI, relative to the tileset the tile belongs to
    pub uri: String,
    pub bounding_volume: Option<Volume>,
    pub group: Option<usize>,
    pub metadata: Option<MetadataEntity>,
}

impl TraversedContent {
    pub(crate) fn to_json(&self) -> Content {
        Content {
            uri: self.uri.clone(),
            bounding_volume: self.bounding_volume.as_ref().map(Volume::to_json),
            group: self.group,
            metadata: self.metadata.clone(),
        }
    }
}

/// Where a new traversed tile hangs in the traversal
#[derive(Debug)]
pub(crate) struct TileOrigin {
    pub parent: Option<Arc<TraversedTile>>,
    pub path: String,
    pub level: u32,
    /// Accumulated transform of the parent
    pub transform: DMat4,
    /// Effective refine of the parent
    pub refine: Refine,
    pub resolver: Arc<dyn ResourceResolver>,
    pub context: Arc<TraversalContext>,
}

/// One node of the traversal, explicit or implicit
#[derive(Debug)]
pub enum TraversedTile {
    Explicit(ExplicitTraversedTile),
    Implicit(ImplicitTraversedTile),
}

impl TraversedTile {
    /// Depth below the traversal root (root = 0)
    pub fn level(&self) -> u32 {
        match self {
            Self::Explicit(t) => t.level(),
            Self::Implicit(t) => t.level(),
        }
    }

    /// Identity within the traversal, e.g. `/root/children/1` or `/root[2-1-0]`
    pub fn path(&self) -> &str {
        match self {
            Self::Explicit(t) => t.path(),
            Self::Implicit(t) => t.path(),
        }
    }

    /// Tree coordinates; `None` for explicit tiles
    pub fn coordinates(&self) -> Option<&TreeCoordinates> {
        match self {
            Self::Explicit(_) => None,
            Self::Implicit(t) => Some(t.coordinates()),
        }
    }

    /// Bounding volume with all ancestor transforms applied
    pub fn bounding_volume(&self) -> &Volume {
        match self {
            Self::Explicit(t) => t.bounding_volume(),
            Self::Implicit(t) => t.bounding_volume(),
        }
    }

    pub fn geometric_error(&self) -> f64 {
        match self {
            Self::Explicit(t) => t.geometric_error(),
            Self::Implicit(t) => t.geometric_error(),
        }
    }

    /// Refine mode, inherited when the tile does not set one
    pub fn refine(&self) -> Refine {
        match self {
            Self::Explicit(t) => t.refine(),
            Self::Implicit(t) => t.refine(),
        }
    }

    /// Accumulated transform from the tileset root
    pub fn transform(&self) -> &DMat4 {
        match self {
            Self::Explicit(t) => t.transform(),
            Self::Implicit(t) => t.transform(),
        }
    }

    pub fn contents(&self) -> &[TraversedContent] {
        match self {
            Self::Explicit(t) => t.contents(),
            Self::Implicit(t) => t.contents(),
        }
    }

    pub fn metadata(&self) -> Option<&MetadataEntity> {
        match self {
            Self::Explicit(t) => t.metadata(),
            Self::Implicit(t) => t.metadata(),
        }
    }

    /// The tile this one was reached from
    pub fn parent(&self) -> Option<&TraversedTile> {
        match self {
            Self::Explicit(t) => t.parent(),
            Self::Implicit(t) => t.parent(),
        }
    }

    /// URI of the subtree file when this tile roots a subtree
    pub fn subtree_uri(&self) -> Option<&str> {
        match self {
            Self::Explicit(_) => None,
            Self::Implicit(t) => t.subtree_uri(),
        }
    }

    /// A plain tile without children, for writing out a static hierarchy
    pub fn as_final_tile(&self) -> Tile {
        match self {
            Self::Explicit(t) => t.as_final_tile(),
            Self::Implicit(t) => t.as_final_tile(),
        }
    }

    /// Children of this tile, loading subtrees or external tilesets as needed.
    ///
    /// Unavailable implicit tiles are left out entirely.
    pub async fn children(self: &Arc<Self>) -> Result<Vec<Arc<TraversedTile>>> {
        match self.as_ref() {
            Self::Explicit(t) => t.children(self).await,
            Self::Implicit(t) => t.children(self).await,
        }
    }
}

/// Wrap a JSON tile, switching to implicit mode when it declares implicit
/// tiling. Returns `None` when an implicit root tile is itself unavailable.
pub(crate) async fn create_traversed_tile(
    tile: Arc<Tile>,
    origin: TileOrigin,
) -> Result<Option<Arc<TraversedTile>>> {
    if tile.implicit_tiling.is_some() {
        let root = ImplicitTraversedTile::create_root(tile, origin).await?;
        return Ok(root.map(|t| Arc::new(TraversedTile::Implicit(t))));
    }
    let explicit = ExplicitTraversedTile::new(tile, origin)?;
    Ok(Some(Arc::new(TraversedTile::Explicit(explicit))))
}
