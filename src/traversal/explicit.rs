//! Traversed tiles backed by literal JSON tiles

use std::fmt;
use std::sync::Arc;

use glam::DMat4;

use crate::core::{Error, Result};
use crate::math::{Volume, transform_from_json};
use crate::tileset::{Content, MetadataEntity, Refine, ResourceResolver, Tile, Tileset};
use crate::traversal::context::TraversalContext;
use crate::traversal::traversed_tile::{
    TileOrigin, TraversedContent, TraversedTile, create_traversed_tile,
};

/// A JSON tile plus everything it inherits from its ancestors
pub struct ExplicitTraversedTile {
    tile: Arc<Tile>,
    path: String,
    level: u32,
    transform: DMat4,
    bounding_volume: Volume,
    viewer_request_volume: Option<Volume>,
    refine: Refine,
    contents: Vec<TraversedContent>,
    parent: Option<Arc<TraversedTile>>,
    resolver: Arc<dyn ResourceResolver>,
    context: Arc<TraversalContext>,
}

fn is_tileset_uri(uri: &str) -> bool {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    uri[..end].to_ascii_lowercase().ends_with(".json")
}

impl ExplicitTraversedTile {
    pub(crate) fn new(tile: Arc<Tile>, origin: TileOrigin) -> Result<Self> {
        let transform = match &tile.transform {
            Some(values) => origin.transform * transform_from_json(values)?,
            None => origin.transform,
        };
        let bounding_volume = Volume::from_json(&tile.bounding_volume)?.transformed(&transform);
        let viewer_request_volume = tile
            .viewer_request_volume
            .as_ref()
            .map(|v| Volume::from_json(v).map(|v| v.transformed(&transform)))
            .transpose()?;
        let refine = tile.refine.unwrap_or(origin.refine);

        let contents = tile
            .content_list()?
            .iter()
            .map(|content| -> Result<TraversedContent> {
                let bounding_volume = content
                    .bounding_volume
                    .as_ref()
                    .map(|v| Volume::from_json(v).map(|v| v.transformed(&transform)))
                    .transpose()?;
                Ok(TraversedContent {
                    uri: content.uri.clone(),
                    bounding_volume,
                    group: content.group,
                    metadata: content.metadata.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tile,
            path: origin.path,
            level: origin.level,
            transform,
            bounding_volume,
            viewer_request_volume,
            refine,
            contents,
            parent: origin.parent,
            resolver: origin.resolver,
            context: origin.context,
        })
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The JSON tile as written
    pub fn raw_tile(&self) -> &Tile {
        &self.tile
    }

    pub fn bounding_volume(&self) -> &Volume {
        &self.bounding_volume
    }

    pub fn geometric_error(&self) -> f64 {
        self.tile.geometric_error
    }

    pub fn refine(&self) -> Refine {
        self.refine
    }

    pub fn transform(&self) -> &DMat4 {
        &self.transform
    }

    pub fn contents(&self) -> &[TraversedContent] {
        &self.contents
    }

    pub fn metadata(&self) -> Option<&MetadataEntity> {
        self.tile.metadata.as_ref()
    }

    pub fn parent(&self) -> Option<&TraversedTile> {
        self.parent.as_deref()
    }

    /// The tile with effective volumes, so it needs no `transform`
    pub fn as_final_tile(&self) -> Tile {
        let mut contents: Vec<Content> = self.contents.iter().map(TraversedContent::to_json).collect();
        let (content, contents) = if self.tile.content.is_some() {
            (contents.pop(), None)
        } else if self.tile.contents.is_some() {
            (None, Some(contents))
        } else {
            (None, None)
        };
        Tile {
            bounding_volume: self.bounding_volume.to_json(),
            viewer_request_volume: self.viewer_request_volume.as_ref().map(Volume::to_json),
            refine: Some(self.refine),
            transform: None,
            content,
            contents,
            children: None,
            ..Tile::clone(&self.tile)
        }
    }

    fn origin(&self, this: &Arc<TraversedTile>, path: String) -> TileOrigin {
        TileOrigin {
            parent: Some(Arc::clone(this)),
            path,
            level: self.level + 1,
            transform: self.transform,
            refine: self.refine,
            resolver: Arc::clone(&self.resolver),
            context: Arc::clone(&self.context),
        }
    }

    pub(crate) async fn children(&self, this: &Arc<TraversedTile>) -> Result<Vec<Arc<TraversedTile>>> {
        let mut children = Vec::with_capacity(self.tile.child_tiles().len());
        for (index, child) in self.tile.child_tiles().iter().enumerate() {
            let origin = self.origin(this, format!("{}/children/{}", self.path, index));
            if let Some(tile) = create_traversed_tile(Arc::clone(child), origin).await? {
                children.push(tile);
            }
        }

        if children.is_empty() && self.context.options().traverse_external_tilesets {
            if let Some(external) = self.external_tileset_root(this).await? {
                children.push(external);
            }
        }
        Ok(children)
    }

    /// Root of the external tileset this tile's only content points at
    async fn external_tileset_root(&self, this: &Arc<TraversedTile>) -> Result<Option<Arc<TraversedTile>>> {
        let [content] = self.contents.as_slice() else {
            return Ok(None);
        };
        if !is_tileset_uri(&content.uri) {
            return Ok(None);
        }

        log::debug!("Loading external tileset {} from {}", content.uri, self.path);
        let context = || format!("external tileset of {}", self.path);
        let data = self
            .resolver
            .resolve_data(&content.uri)
            .await
            .map_err(|e| Error::unresolvable(content.uri.as_str(), format!("{}: {}", context(), e)))?
            .ok_or_else(|| Error::unresolvable(content.uri.as_str(), context()))?;
        let tileset = Tileset::from_slice(&data)?;
        self.context.note_external_tileset();

        let mut origin = self.origin(this, format!("{}/content/root", self.path));
        origin.resolver = self.resolver.derive(&content.uri);
        create_traversed_tile(Arc::clone(&tileset.root), origin).await
    }
}

impl fmt::Debug for ExplicitTraversedTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplicitTraversedTile")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("bounding_volume", &self.bounding_volume)
            .field("refine", &self.refine)
            .field("contents", &self.contents)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_tileset_uri() {
        assert!(is_tileset_uri("external/tileset.json"));
        assert!(is_tileset_uri("a.JSON?v=2"));
        assert!(!is_tileset_uri("content.glb"));
        assert!(!is_tileset_uri("tile.b3dm#json"));
    }
}
