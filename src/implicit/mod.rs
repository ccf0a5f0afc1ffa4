//! Implicit tiling: coordinates, subtrees and availability

pub mod availability;
pub mod coordinates;
pub mod metadata;
pub mod resolver;
pub mod subtree;
pub mod subtree_info;
pub mod template;
pub mod tiling;

pub use availability::{AvailabilityInfo, BufferAvailability, ConstantAvailability};
pub use coordinates::{
    Descendants, DescendantsIter, OctreeCoordinates, QuadtreeCoordinates, TreeCoordinates,
};
pub use metadata::{MetadataBinder, MetadataTable};
pub use resolver::ResolvedSubtree;
pub use subtree::{
    AvailabilityDescriptor, BufferSlice, Subtree, SubtreeBuffer, SubtreeBufferView, SubtreeFile,
    encode_subtree,
};
pub use subtree_info::SubtreeInfo;
pub use tiling::{ImplicitTilingInfo, SubdivisionScheme};
