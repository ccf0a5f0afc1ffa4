//! Availability and metadata queries against one resolved subtree
//!
//! All queries take absolute tree coordinates and translate them into the
//! subtree's own numbering: tiles and contents by level-order index over the
//! subtree's levels, child subtrees by Morton index at the level just below.

use std::sync::Arc;

use crate::core::{Error, Result};
use crate::implicit::availability::AvailabilityInfo;
use crate::implicit::coordinates::TreeCoordinates;
use crate::implicit::metadata::{MetadataBinder, MetadataTable};
use crate::implicit::resolver::ResolvedSubtree;
use crate::implicit::subtree::SubtreeFile;
use crate::implicit::template;
use crate::implicit::tiling::ImplicitTilingInfo;
use crate::tileset::{MetadataEntity, ResourceResolver};

/// A property table plus the availability that orders its rows
#[derive(Debug)]
struct BoundTable {
    table: Arc<dyn MetadataTable>,
    /// Row of an available index is the number of available indices before it
    availability: Arc<dyn AvailabilityInfo>,
}

impl BoundTable {
    fn new(table: Arc<dyn MetadataTable>, availability: Arc<dyn AvailabilityInfo>) -> Self {
        let available = availability.available_count();
        if available > table.count() as u64 {
            log::warn!(
                "Property table has {} rows for {} available entries",
                table.count(),
                available
            );
        }
        Self { table, availability }
    }

    fn entity(&self, index: u64) -> Result<Option<MetadataEntity>> {
        if !self.availability.is_available(index)? {
            return Ok(None);
        }
        let row = self.availability.available_before(index)?;
        Ok(usize::try_from(row).ok().and_then(|row| self.table.entity(row)))
    }
}

/// One resolved subtree, anchored at its root coordinates
#[derive(Debug)]
pub struct SubtreeInfo {
    root: TreeCoordinates,
    subtree_levels: u32,
    resolved: ResolvedSubtree,
    tile_metadata: Option<BoundTable>,
    content_metadata: Vec<Option<BoundTable>>,
}

impl SubtreeInfo {
    /// Load and resolve the subtree rooted at `root`.
    ///
    /// The file URI comes from the tiling's subtree template; `resolver`
    /// is based where the template is relative to.
    pub async fn load(
        root: TreeCoordinates,
        tiling: &ImplicitTilingInfo,
        resolver: &dyn ResourceResolver,
        binder: Option<&dyn MetadataBinder>,
    ) -> Result<Self> {
        let uri = template::substitute(&tiling.subtrees_uri, &root);
        log::debug!("Loading subtree {} rooted at {}", uri, root);

        let context = || format!("subtree rooted at {}", root);
        let data = resolver
            .resolve_data(&uri)
            .await
            .map_err(|e| Error::unresolvable(&uri, format!("{}: {}", context(), e)))?
            .ok_or_else(|| Error::unresolvable(&uri, context()))?;
        let file = SubtreeFile::parse(data, &uri)?;
        let subtree_resolver = resolver.derive(&uri);
        let resolved = ResolvedSubtree::resolve(
            file,
            tiling.scheme,
            tiling.subtree_levels,
            subtree_resolver.as_ref(),
            &uri,
        )
        .await?;

        Self::new(root, tiling.subtree_levels, resolved, binder)
    }

    /// Wrap an already resolved subtree
    pub fn new(
        root: TreeCoordinates,
        subtree_levels: u32,
        resolved: ResolvedSubtree,
        binder: Option<&dyn MetadataBinder>,
    ) -> Result<Self> {
        let subtree = resolved.subtree();
        let mut tile_metadata = None;
        let mut content_metadata = Vec::new();

        match binder {
            Some(binder) => {
                if let Some(table) = subtree.tile_metadata {
                    let bound = binder.bind(&resolved, table)?;
                    tile_metadata = Some(BoundTable::new(
                        bound,
                        Arc::clone(resolved.tile_availability()),
                    ));
                }
                if subtree.content_metadata.len() > resolved.content_availability().len() {
                    return Err(Error::malformed_subtree(
                        resolved.uri(),
                        "more contentMetadata entries than contentAvailability entries",
                    ));
                }
                for (slot, &table) in subtree.content_metadata.iter().enumerate() {
                    let bound = binder.bind(&resolved, table)?;
                    content_metadata.push(Some(BoundTable::new(
                        bound,
                        Arc::clone(&resolved.content_availability()[slot]),
                    )));
                }
            }
            None => {
                if subtree.tile_metadata.is_some() || !subtree.content_metadata.is_empty() {
                    log::trace!("No metadata binder, ignoring metadata of {}", resolved.uri());
                }
            }
        }

        Ok(Self {
            root,
            subtree_levels,
            resolved,
            tile_metadata,
            content_metadata,
        })
    }

    pub fn root(&self) -> &TreeCoordinates {
        &self.root
    }

    pub fn subtree_levels(&self) -> u32 {
        self.subtree_levels
    }

    pub fn uri(&self) -> &str {
        self.resolved.uri()
    }

    pub fn resolved(&self) -> &ResolvedSubtree {
        &self.resolved
    }

    /// Number of content slots with availability
    pub fn content_count(&self) -> usize {
        self.resolved.content_availability().len()
    }

    /// Raw `subtreeMetadata` JSON, if present
    pub fn subtree_metadata(&self) -> Option<&serde_json::Value> {
        self.resolved.subtree().subtree_metadata.as_ref()
    }

    /// Level-order index of a tile within this subtree
    fn tile_index(&self, coordinates: &TreeCoordinates) -> Result<u64> {
        let local = coordinates.relative_to(&self.root)?;
        if local.level() >= self.subtree_levels {
            return Err(Error::OutOfRange(format!(
                "{} is below subtree {} ({} levels)",
                coordinates, self.root, self.subtree_levels
            )));
        }
        Ok(local.to_global_index())
    }

    pub fn is_tile_available(&self, coordinates: &TreeCoordinates) -> Result<bool> {
        let index = self.tile_index(coordinates)?;
        self.resolved.tile_availability().is_available(index)
    }

    pub fn is_content_available(&self, coordinates: &TreeCoordinates, slot: usize) -> Result<bool> {
        let index = self.tile_index(coordinates)?;
        let availability = self.resolved.content_availability().get(slot).ok_or_else(|| {
            Error::OutOfRange(format!(
                "content slot {} of subtree {} with {} slots",
                slot,
                self.uri(),
                self.content_count()
            ))
        })?;
        availability.is_available(index)
    }

    /// Whether a subtree rooted at `coordinates` exists.
    ///
    /// `coordinates` must lie exactly `subtree_levels` below this root.
    pub fn is_child_subtree_available(&self, coordinates: &TreeCoordinates) -> Result<bool> {
        let local = coordinates.relative_to(&self.root)?;
        if local.level() != self.subtree_levels {
            return Err(Error::OutOfRange(format!(
                "{} is not a child subtree root of {}",
                coordinates, self.root
            )));
        }
        self.resolved
            .child_subtree_availability()
            .is_available(local.to_index())
    }

    pub fn tile_metadata(&self, coordinates: &TreeCoordinates) -> Result<Option<MetadataEntity>> {
        let index = self.tile_index(coordinates)?;
        match &self.tile_metadata {
            Some(table) => table.entity(index),
            None => Ok(None),
        }
    }

    pub fn content_metadata(
        &self,
        coordinates: &TreeCoordinates,
        slot: usize,
    ) -> Result<Option<MetadataEntity>> {
        let index = self.tile_index(coordinates)?;
        match self.content_metadata.get(slot).and_then(Option::as_ref) {
            Some(table) => table.entity(index),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implicit::coordinates::QuadtreeCoordinates;
    use crate::implicit::subtree::{
        AvailabilityDescriptor, Subtree, SubtreeBuffer, SubtreeBufferView, encode_subtree,
    };
    use crate::implicit::tiling::SubdivisionScheme;
    use crate::tileset::{FileResourceResolver, MemoryResourceResolver};

    fn quad(level: u32, x: u32, y: u32) -> TreeCoordinates {
        TreeCoordinates::Quadtree(QuadtreeCoordinates::new(level, x, y).unwrap())
    }

    fn tiling() -> ImplicitTilingInfo {
        ImplicitTilingInfo {
            scheme: SubdivisionScheme::Quadtree,
            subtree_levels: 2,
            available_levels: 6,
            subtrees_uri: "subtrees/{level}.{x}.{y}.subtree".into(),
        }
    }

    /// Tile bits: root, (1,0,0) and (1,1,1) available.
    /// Child subtree bits: only Morton index 0 (level 2, 0, 0) set.
    fn sample_subtree() -> (Subtree, Vec<u8>) {
        let subtree = Subtree {
            buffers: vec![SubtreeBuffer { byte_length: 8, ..Default::default() }],
            buffer_views: vec![
                SubtreeBufferView { buffer: 0, byte_offset: 0, byte_length: 1, name: None },
                SubtreeBufferView { buffer: 0, byte_offset: 1, byte_length: 2, name: None },
            ],
            tile_availability: AvailabilityDescriptor::buffer_view(0),
            content_availability: vec![AvailabilityDescriptor::constant(false)],
            child_subtree_availability: AvailabilityDescriptor::buffer_view(1),
            tile_metadata: Some(0),
            property_tables: vec![serde_json::json!({ "class": "tile", "count": 3 })],
            ..Default::default()
        };
        // Level-order: 0 = root, 1..=4 = level 1 in Morton order
        let binary = vec![0b0001_0011, 0b0000_0001, 0b0000_0000];
        (subtree, binary)
    }

    #[derive(Debug)]
    struct IndexTable(usize);

    impl MetadataTable for IndexTable {
        fn count(&self) -> usize {
            self.0
        }

        fn entity(&self, row: usize) -> Option<MetadataEntity> {
            let mut properties = serde_json::Map::new();
            properties.insert("row".into(), row.into());
            (row < self.0).then(|| MetadataEntity { class: "tile".into(), properties })
        }
    }

    #[derive(Debug)]
    struct IndexBinder;

    impl MetadataBinder for IndexBinder {
        fn bind(&self, subtree: &ResolvedSubtree, table: usize) -> Result<Arc<dyn MetadataTable>> {
            let count = subtree.subtree().property_tables[table]["count"].as_u64().unwrap_or(0);
            Ok(Arc::new(IndexTable(count as usize)))
        }
    }

    async fn load(binder: Option<&dyn MetadataBinder>) -> SubtreeInfo {
        let (subtree, binary) = sample_subtree();
        let resolver = MemoryResourceResolver::new([(
            "subtrees/0.0.0.subtree",
            encode_subtree(&subtree, &binary).unwrap(),
        )]);
        SubtreeInfo::load(quad(0, 0, 0), &tiling(), &resolver, binder).await.unwrap()
    }

    #[tokio::test]
    async fn test_tile_availability_by_coordinates() {
        let info = load(None).await;
        assert!(info.is_tile_available(&quad(0, 0, 0)).unwrap());
        assert!(info.is_tile_available(&quad(1, 0, 0)).unwrap());
        assert!(!info.is_tile_available(&quad(1, 1, 0)).unwrap());
        assert!(info.is_tile_available(&quad(1, 1, 1)).unwrap());
        // Below the subtree's levels
        assert!(matches!(info.is_tile_available(&quad(2, 0, 0)), Err(Error::OutOfRange(_))));
    }

    #[tokio::test]
    async fn test_child_subtree_availability_has_exactly_one() {
        let info = load(None).await;
        let root = quad(0, 0, 0);
        let available: Vec<_> = root
            .descendants(2, false)
            .iter()
            .filter(|c| c.level() == 2)
            .filter(|c| info.is_child_subtree_available(c).unwrap())
            .collect();
        assert_eq!(available, vec![quad(2, 0, 0)]);
        assert!(info.is_child_subtree_available(&quad(1, 0, 0)).is_err());
    }

    #[tokio::test]
    async fn test_content_slots() {
        let info = load(None).await;
        assert_eq!(info.content_count(), 1);
        assert!(!info.is_content_available(&quad(0, 0, 0), 0).unwrap());
        assert!(info.is_content_available(&quad(0, 0, 0), 1).is_err());
    }

    #[tokio::test]
    async fn test_tile_metadata_rows_follow_availability() {
        let info = load(Some(&IndexBinder)).await;
        let row = |c: TreeCoordinates| {
            info.tile_metadata(&c).unwrap().map(|e| e.properties["row"].as_u64().unwrap())
        };
        assert_eq!(row(quad(0, 0, 0)), Some(0));
        assert_eq!(row(quad(1, 0, 0)), Some(1));
        assert_eq!(row(quad(1, 1, 0)), None);
        assert_eq!(row(quad(1, 1, 1)), Some(2));

        assert!(load(None).await.tile_metadata(&quad(0, 0, 0)).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_subtree_is_unresolvable() {
        let resolver = MemoryResourceResolver::default();
        let err = SubtreeInfo::load(quad(0, 0, 0), &tiling(), &resolver, None).await.unwrap_err();
        assert!(matches!(err, Error::UnresolvableResource { ref uri, .. } if uri == "subtrees/0.0.0.subtree"));
    }

    #[tokio::test]
    async fn test_nested_subtree_numbering() {
        // A subtree rooted at (2, 3, 1) numbers (3, 7, 3) as local (1, 1, 1)
        let subtree = Subtree {
            tile_availability: AvailabilityDescriptor::constant(true),
            child_subtree_availability: AvailabilityDescriptor::constant(false),
            ..Default::default()
        };
        let resolver = MemoryResourceResolver::new([(
            "subtrees/2.3.1.subtree",
            encode_subtree(&subtree, &[]).unwrap(),
        )]);
        let info = SubtreeInfo::load(quad(2, 3, 1), &tiling(), &resolver, None).await.unwrap();
        assert!(info.is_tile_available(&quad(3, 7, 3)).unwrap());
        assert!(info.is_tile_available(&quad(3, 0, 0)).is_err());
        assert!(!info.is_child_subtree_available(&quad(4, 12, 4)).unwrap());
    }

    #[tokio::test]
    async fn test_metadata_rows_on_deepest_subtree() {
        // Every tile of a 31 level quadtree subtree carries a row
        let subtree = Subtree {
            tile_availability: AvailabilityDescriptor::constant(true),
            child_subtree_availability: AvailabilityDescriptor::constant(false),
            tile_metadata: Some(0),
            property_tables: vec![serde_json::json!({ "class": "tile", "count": 1u64 << 62 })],
            ..Default::default()
        };
        let tiling = ImplicitTilingInfo { subtree_levels: 31, available_levels: 31, ..tiling() };
        let resolver = MemoryResourceResolver::new([(
            "subtrees/0.0.0.subtree",
            encode_subtree(&subtree, &[]).unwrap(),
        )]);
        let info = SubtreeInfo::load(quad(0, 0, 0), &tiling, &resolver, Some(&IndexBinder))
            .await
            .unwrap();

        let deep = quad(30, 5, 3);
        let entity = info.tile_metadata(&deep).unwrap().unwrap();
        assert_eq!(entity.properties["row"].as_u64(), Some(deep.to_global_index()));
    }

    #[tokio::test]
    async fn test_unreadable_subtree_is_unresolvable() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("subtrees/0.0.0.subtree")).await.unwrap();

        let resolver = FileResourceResolver::new(dir.path());
        let err = SubtreeInfo::load(quad(0, 0, 0), &tiling(), &resolver, None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvableResource { ref uri, ref context }
                if uri == "subtrees/0.0.0.subtree" && context.starts_with("subtree rooted at 0-0-0")
        ));
    }
}
