//! Per-call traversal state shared by all traversed tiles

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::Result;
use crate::implicit::{ImplicitTilingInfo, MetadataBinder, SubtreeInfo, TreeCoordinates};
use crate::tileset::ResourceResolver;
use crate::traversal::options::TraversalOptions;

/// Created fresh for every traversal call; nothing is cached across calls.
#[derive(Debug)]
pub(crate) struct TraversalContext {
    options: TraversalOptions,
    binder: Option<Arc<dyn MetadataBinder>>,
    subtrees_loaded: AtomicUsize,
    external_tilesets_loaded: AtomicUsize,
}

impl TraversalContext {
    pub(crate) fn new(options: TraversalOptions, binder: Option<Arc<dyn MetadataBinder>>) -> Self {
        Self {
            options,
            binder,
            subtrees_loaded: AtomicUsize::new(0),
            external_tilesets_loaded: AtomicUsize::new(0),
        }
    }

    pub(crate) fn options(&self) -> &TraversalOptions {
        &self.options
    }

    /// Load the subtree rooted at `root`
    pub(crate) async fn load_subtree(
        &self,
        root: TreeCoordinates,
        tiling: &ImplicitTilingInfo,
        resolver: &dyn ResourceResolver,
    ) -> Result<Arc<SubtreeInfo>> {
        let info = SubtreeInfo::load(root, tiling, resolver, self.binder.as_deref()).await?;
        self.subtrees_loaded.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(info))
    }

    pub(crate) fn note_external_tileset(&self) {
        self.external_tilesets_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn subtrees_loaded(&self) -> usize {
        self.subtrees_loaded.load(Ordering::Relaxed)
    }

    pub(crate) fn external_tilesets_loaded(&self) -> usize {
        self.external_tilesets_loaded.load(Ordering::Relaxed)
    }
}
