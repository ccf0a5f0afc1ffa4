//! Tileset JSON model and resource access

pub mod model;
pub mod resource;

pub use model::{
    Asset, BoundingVolume, Content, ImplicitTiling, MetadataEntity, Refine, SubtreesUri, Tile,
    Tileset,
};
pub use resource::{
    FileResourceResolver, MemoryResourceResolver, ResolveFuture, ResourceResolver, join_uri,
    parent_uri,
};
