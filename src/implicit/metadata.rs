//! Boundary to the external property table codec
//!
//! Decoding binary property tables is not done here. A [`MetadataBinder`]
//! turns one of a subtree's property tables into a [`MetadataTable`] that
//! answers per-row lookups.

use std::fmt;
use std::sync::Arc;

use crate::core::Result;
use crate::implicit::resolver::ResolvedSubtree;
use crate::tileset::MetadataEntity;

/// Rows of one decoded property table
pub trait MetadataTable: fmt::Debug + Send + Sync {
    /// Number of rows
    fn count(&self) -> usize;

    /// Entity for `row`, or `None` when the row does not exist
    fn entity(&self, row: usize) -> Option<MetadataEntity>;
}

/// Binds property tables of resolved subtrees to a codec
pub trait MetadataBinder: fmt::Debug + Send + Sync {
    fn bind(&self, subtree: &ResolvedSubtree, property_table: usize) -> Result<Arc<dyn MetadataTable>>;
}
