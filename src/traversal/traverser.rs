//! Tileset traverser
//!
//! Walks a tileset from its root, handing every traversed tile to a visitor
//! before its children. Children are expanded only when the visitor asks for
//! them, so subtrees below skipped tiles are never loaded.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::DMat4;

use crate::core::Result;
use crate::implicit::MetadataBinder;
use crate::tileset::{Refine, ResourceResolver, Tileset};
use crate::traversal::context::TraversalContext;
use crate::traversal::options::{TraversalOptions, TraversalStats, Visit};
use crate::traversal::traversed_tile::{TileOrigin, TraversedTile, create_traversed_tile};

/// Path of the tileset root tile
pub const ROOT_PATH: &str = "/root";

/// Drives traversals over tilesets read through one resolver
#[derive(Debug, Clone)]
pub struct TilesetTraverser {
    resolver: Arc<dyn ResourceResolver>,
    options: TraversalOptions,
    binder: Option<Arc<dyn MetadataBinder>>,
}

impl TilesetTraverser {
    /// `resolver` must be based at the directory of the tileset JSON.
    pub fn new(resolver: Arc<dyn ResourceResolver>, options: TraversalOptions) -> Self {
        Self {
            resolver,
            options,
            binder: None,
        }
    }

    /// Attach implicit tile metadata through `binder`
    pub fn with_metadata_binder(mut self, binder: Arc<dyn MetadataBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn options(&self) -> &TraversalOptions {
        &self.options
    }

    /// Visit every reachable tile of `tileset`, parents before children.
    ///
    /// The visitor's return value decides whether the tile's children are
    /// visited; see [`Visit`]. An error from the visitor aborts the walk and
    /// is returned as is. Every call starts without cached subtrees.
    pub async fn traverse<F, V>(&self, tileset: &Tileset, mut visitor: F) -> Result<TraversalStats>
    where
        F: FnMut(&TraversedTile) -> Result<V>,
        V: Into<Visit>,
    {
        let context = Arc::new(TraversalContext::new(self.options.clone(), self.binder.clone()));
        let origin = TileOrigin {
            parent: None,
            path: ROOT_PATH.to_string(),
            level: 0,
            transform: DMat4::IDENTITY,
            refine: Refine::Replace,
            resolver: Arc::clone(&self.resolver),
            context: Arc::clone(&context),
        };

        let depth_first = self.options.depth_first;
        let mut stats = TraversalStats::default();
        let mut pending = VecDeque::new();
        match create_traversed_tile(Arc::clone(&tileset.root), origin).await? {
            Some(root) => pending.push_back(root),
            None => log::debug!("Root tile is not available, nothing to traverse"),
        }

        loop {
            let next = if depth_first {
                pending.pop_back()
            } else {
                pending.pop_front()
            };
            let Some(tile) = next else {
                break;
            };

            stats.visited += 1;
            match visitor(tile.as_ref())?.into() {
                Visit::Continue => {}
                Visit::SkipChildren => {
                    log::trace!("Skipping children of {}", tile.path());
                    stats.skipped += 1;
                    continue;
                }
                Visit::Stop => {
                    log::debug!("Traversal stopped at {}", tile.path());
                    stats.stopped = true;
                    break;
                }
            }

            if self.options.max_depth.is_some_and(|max| tile.level() >= max) {
                continue;
            }

            let children = tile.children().await?;
            if depth_first {
                pending.extend(children.into_iter().rev());
            } else {
                pending.extend(children);
            }
        }

        stats.subtrees_loaded = context.subtrees_loaded();
        stats.external_tilesets_loaded = context.external_tilesets_loaded();
        log::debug!(
            "Traversal visited {} tiles, loaded {} subtrees",
            stats.visited,
            stats.subtrees_loaded
        );
        Ok(stats)
    }
}
