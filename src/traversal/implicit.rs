//! Traversed tiles synthesized from implicit tiling
//!
//! An implicit tile exists only if its subtree marks it available. Children
//! inside the current subtree reuse its [`SubtreeInfo`]; children on the
//! subtree's bottom boundary root a new subtree, which is loaded only when
//! the parent subtree's child subtree availability says it exists.

use std::fmt;
use std::sync::Arc;

use glam::DMat4;

use crate::core::{Error, Result};
use crate::implicit::{ImplicitTilingInfo, SubtreeInfo, TreeCoordinates, template};
use crate::math::{Volume, transform_from_json};
use crate::tileset::{Content, MetadataEntity, Refine, ResourceResolver, Tile};
use crate::traversal::context::TraversalContext;
use crate::traversal::traversed_tile::{TileOrigin, TraversedContent, TraversedTile};

/// State shared by every tile of one implicit region
struct ImplicitRoot {
    tile: Arc<Tile>,
    path: String,
    tiling: ImplicitTilingInfo,
    /// Root volume before transforms; subdivided per tile
    volume: Volume,
    /// Accumulated transform including the root tile's own
    transform: DMat4,
    refine: Refine,
    /// Traversal depth of the implicit root
    base_level: u32,
    content_templates: Vec<Content>,
    resolver: Arc<dyn ResourceResolver>,
    context: Arc<TraversalContext>,
}

/// A tile derived from coordinates and the subtree that covers them
pub struct ImplicitTraversedTile {
    root: Arc<ImplicitRoot>,
    coordinates: TreeCoordinates,
    subtree: Arc<SubtreeInfo>,
    path: String,
    bounding_volume: Volume,
    geometric_error: f64,
    contents: Vec<TraversedContent>,
    metadata: Option<MetadataEntity>,
    parent: Option<Arc<TraversedTile>>,
}

impl ImplicitTraversedTile {
    /// Turn a JSON tile with `implicitTiling` into the implicit root tile.
    ///
    /// Loads the root subtree. `None` if the root tile is unavailable.
    pub(crate) async fn create_root(tile: Arc<Tile>, origin: TileOrigin) -> Result<Option<Self>> {
        let raw = tile.implicit_tiling.as_ref().ok_or_else(|| {
            Error::MalformedTileset(format!("{} has no implicitTiling", origin.path))
        })?;
        let tiling = ImplicitTilingInfo::from_json(raw)?;
        let transform = match &tile.transform {
            Some(values) => origin.transform * transform_from_json(values)?,
            None => origin.transform,
        };
        let volume = Volume::from_json(&tile.bounding_volume)?;
        if matches!(volume, Volume::Sphere { .. }) {
            return Err(Error::InvalidSubdivision(format!(
                "{} uses a sphere as implicit root volume",
                origin.path
            )));
        }
        let content_templates = tile.content_list()?.to_vec();

        log::debug!(
            "Switching to implicit traversal at {} ({}, {} subtree levels, {} available levels)",
            origin.path,
            tiling.scheme.as_str(),
            tiling.subtree_levels,
            tiling.available_levels
        );
        let coordinates = TreeCoordinates::root(tiling.scheme);
        let subtree = origin
            .context
            .load_subtree(coordinates, &tiling, origin.resolver.as_ref())
            .await?;

        let root = Arc::new(ImplicitRoot {
            refine: tile.refine.unwrap_or(origin.refine),
            tile,
            path: origin.path,
            tiling,
            volume,
            transform,
            base_level: origin.level,
            content_templates,
            resolver: origin.resolver,
            context: origin.context,
        });
        Self::create(root, coordinates, subtree, origin.parent)
    }

    /// Build the tile at `coordinates`, or `None` when it is unavailable
    fn create(
        root: Arc<ImplicitRoot>,
        coordinates: TreeCoordinates,
        subtree: Arc<SubtreeInfo>,
        parent: Option<Arc<TraversedTile>>,
    ) -> Result<Option<Self>> {
        if !subtree.is_tile_available(&coordinates)? {
            return Ok(None);
        }
        if coordinates.level() >= root.tiling.available_levels {
            return Err(Error::malformed_subtree(
                subtree.uri(),
                format!(
                    "tile {} is available but availableLevels is {}",
                    coordinates, root.tiling.available_levels
                ),
            ));
        }
        if root.content_templates.len() > subtree.content_count() {
            return Err(Error::malformed_subtree(
                subtree.uri(),
                format!(
                    "{} content templates but only {} contentAvailability entries",
                    root.content_templates.len(),
                    subtree.content_count()
                ),
            ));
        }

        let bounding_volume = root.volume.subdivide(&coordinates)?.transformed(&root.transform);
        let geometric_error = root.tile.geometric_error / (1u64 << coordinates.level()) as f64;

        let mut contents = Vec::new();
        for (slot, content) in root.content_templates.iter().enumerate() {
            if !subtree.is_content_available(&coordinates, slot)? {
                continue;
            }
            contents.push(TraversedContent {
                uri: template::substitute(&content.uri, &coordinates),
                bounding_volume: None,
                group: content.group,
                metadata: subtree.content_metadata(&coordinates, slot)?,
            });
        }
        let metadata = subtree.tile_metadata(&coordinates)?;

        Ok(Some(Self {
            path: format!("{}[{}]", root.path, coordinates),
            root,
            coordinates,
            subtree,
            bounding_volume,
            geometric_error,
            contents,
            metadata,
            parent,
        }))
    }

    pub fn level(&self) -> u32 {
        self.root.base_level + self.coordinates.level()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn coordinates(&self) -> &TreeCoordinates {
        &self.coordinates
    }

    /// Subtree that decides this tile's availability
    pub fn subtree(&self) -> &SubtreeInfo {
        &self.subtree
    }

    pub fn implicit_tiling(&self) -> &ImplicitTilingInfo {
        &self.root.tiling
    }

    pub fn bounding_volume(&self) -> &Volume {
        &self.bounding_volume
    }

    pub fn geometric_error(&self) -> f64 {
        self.geometric_error
    }

    pub fn refine(&self) -> Refine {
        self.root.refine
    }

    pub fn transform(&self) -> &DMat4 {
        &self.root.transform
    }

    pub fn contents(&self) -> &[TraversedContent] {
        &self.contents
    }

    pub fn metadata(&self) -> Option<&MetadataEntity> {
        self.metadata.as_ref()
    }

    pub fn parent(&self) -> Option<&TraversedTile> {
        self.parent.as_deref()
    }

    pub fn subtree_uri(&self) -> Option<&str> {
        (self.subtree.root() == &self.coordinates).then(|| self.subtree.uri())
    }

    /// An explicit tile equivalent to this one, with the effective volume
    pub fn as_final_tile(&self) -> Tile {
        let mut contents: Vec<Content> = self.contents.iter().map(TraversedContent::to_json).collect();
        let (content, contents) = if contents.len() == 1 {
            (contents.pop(), None)
        } else if contents.is_empty() {
            (None, None)
        } else {
            (None, Some(contents))
        };

        Tile {
            bounding_volume: self.bounding_volume.to_json(),
            geometric_error: self.geometric_error,
            refine: Some(self.root.refine),
            content,
            contents,
            metadata: self.metadata.clone(),
            ..Default::default()
        }
    }

    pub(crate) async fn children(&self, this: &Arc<TraversedTile>) -> Result<Vec<Arc<TraversedTile>>> {
        let tiling = &self.root.tiling;
        if self.coordinates.level() >= tiling.scheme.max_level() {
            return Ok(Vec::new());
        }

        let mut children = Vec::new();
        for child in self.coordinates.children() {
            let relative_level = child.level() - self.subtree.root().level();
            let subtree = if relative_level < tiling.subtree_levels {
                Arc::clone(&self.subtree)
            } else {
                if !self.subtree.is_child_subtree_available(&child)? {
                    log::trace!("No child subtree at {}", child);
                    continue;
                }
                if child.level() >= tiling.available_levels {
                    return Err(Error::malformed_subtree(
                        self.subtree.uri(),
                        format!(
                            "child subtree {} is available but availableLevels is {}",
                            child, tiling.available_levels
                        ),
                    ));
                }
                self.root
                    .context
                    .load_subtree(child, tiling, self.root.resolver.as_ref())
                    .await?
            };

            match Self::create(Arc::clone(&self.root), child, subtree, Some(Arc::clone(this)))? {
                Some(tile) => children.push(Arc::new(TraversedTile::Implicit(tile))),
                None => log::trace!("Pruned unavailable tile {}", child),
            }
        }
        Ok(children)
    }
}

impl fmt::Debug for ImplicitTraversedTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplicitTraversedTile")
            .field("path", &self.path)
            .field("coordinates", &self.coordinates)
            .field("subtree", &self.subtree.uri())
            .field("bounding_volume", &self.bounding_volume)
            .field("contents", &self.contents)
            .finish_non_exhaustive()
    }
}
