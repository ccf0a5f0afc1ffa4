//! Quadtree and octree node coordinates
//!
//! A coordinate is a level plus one integer per split axis, with every axis
//! value in `[0, 2^level)`. Children are always produced in Morton order, so
//! the n-th child is the one whose Morton index within the parent is n.

use std::collections::VecDeque;

use crate::core::{Error, Result};
use crate::implicit::tiling::SubdivisionScheme;
use crate::math::morton::{decode_morton_2d, decode_morton_3d, encode_morton_2d, encode_morton_3d};

/// Deepest supported quadtree level
pub const MAX_QUADTREE_LEVEL: u32 = 30;
/// Deepest supported octree level
pub const MAX_OCTREE_LEVEL: u32 = 20;

fn check_axes(level: u32, max_level: u32, axes: &[u32]) -> Result<()> {
    if level > max_level {
        return Err(Error::OutOfRange(format!(
            "level {} exceeds maximum {}",
            level, max_level
        )));
    }
    let limit = 1u64 << level;
    if let Some(axis) = axes.iter().find(|&&a| a as u64 >= limit) {
        return Err(Error::OutOfRange(format!(
            "axis value {} not below 2^{}",
            axis, level
        )));
    }
    Ok(())
}

/// Sum of `branching^l` for `l` in `[0, level)`
fn level_offset(dimensions: u32, level: u32) -> u64 {
    ((1u64 << (dimensions * level)) - 1) / ((1u64 << dimensions) - 1)
}

/// Address of a quadtree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuadtreeCoordinates {
    level: u32,
    x: u32,
    y: u32,
}

impl QuadtreeCoordinates {
    pub fn new(level: u32, x: u32, y: u32) -> Result<Self> {
        check_axes(level, MAX_QUADTREE_LEVEL, &[x, y])?;
        Ok(Self { level, x, y })
    }

    pub fn root() -> Self {
        Self { level: 0, x: 0, y: 0 }
    }

    /// Inverse of [`Self::to_index`]
    pub fn from_index(level: u32, index: u64) -> Result<Self> {
        let (x, y) = decode_morton_2d(index);
        if level <= MAX_QUADTREE_LEVEL && index >> (2 * level) != 0 {
            return Err(Error::OutOfRange(format!(
                "index {} outside quadtree level {}",
                index, level
            )));
        }
        Self::new(level, x, y)
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn parent(&self) -> Result<Self> {
        if self.level == 0 {
            return Err(Error::OutOfRange("the root quadtree node has no parent".into()));
        }
        Ok(Self {
            level: self.level - 1,
            x: self.x >> 1,
            y: self.y >> 1,
        })
    }

    /// The four children in Morton order
    pub fn children(&self) -> [Self; 4] {
        debug_assert!(self.level < MAX_QUADTREE_LEVEL);
        let level = self.level + 1;
        std::array::from_fn(|i| Self {
            level,
            x: (self.x << 1) | (i as u32 & 1),
            y: (self.y << 1) | ((i as u32 >> 1) & 1),
        })
    }

    /// Morton index within this level
    pub fn to_index(&self) -> u64 {
        encode_morton_2d(self.x, self.y)
    }

    /// Index in level order across the whole tree
    pub fn to_global_index(&self) -> u64 {
        level_offset(2, self.level) + self.to_index()
    }
}

/// Address of an octree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OctreeCoordinates {
    level: u32,
    x: u32,
    y: u32,
    z: u32,
}

impl OctreeCoordinates {
    pub fn new(level: u32, x: u32, y: u32, z: u32) -> Result<Self> {
        check_axes(level, MAX_OCTREE_LEVEL, &[x, y, z])?;
        Ok(Self { level, x, y, z })
    }

    pub fn root() -> Self {
        Self { level: 0, x: 0, y: 0, z: 0 }
    }

    /// Inverse of [`Self::to_index`]
    pub fn from_index(level: u32, index: u64) -> Result<Self> {
        let (x, y, z) = decode_morton_3d(index);
        if level <= MAX_OCTREE_LEVEL && index >> (3 * level) != 0 {
            return Err(Error::OutOfRange(format!(
                "index {} outside octree level {}",
                index, level
            )));
        }
        Self::new(level, x, y, z)
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn z(&self) -> u32 {
        self.z
    }

    pub fn parent(&self) -> Result<Self> {
        if self.level == 0 {
            return Err(Error::OutOfRange("the root octree node has no parent".into()));
        }
        Ok(Self {
            level: self.level - 1,
            x: self.x >> 1,
            y: self.y >> 1,
            z: self.z >> 1,
        })
    }

    /// The eight children in Morton order
    pub fn children(&self) -> [Self; 8] {
        debug_assert!(self.level < MAX_OCTREE_LEVEL);
        let level = self.level + 1;
        std::array::from_fn(|i| Self {
            level,
            x: (self.x << 1) | (i as u32 & 1),
            y: (self.y << 1) | ((i as u32 >> 1) & 1),
            z: (self.z << 1) | ((i as u32 >> 2) & 1),
        })
    }

    /// Morton index within this level
    pub fn to_index(&self) -> u64 {
        encode_morton_3d(self.x, self.y, self.z)
    }

    /// Index in level order across the whole tree
    pub fn to_global_index(&self) -> u64 {
        level_offset(3, self.level) + self.to_index()
    }
}

/// A quadtree or octree coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TreeCoordinates {
    Quadtree(QuadtreeCoordinates),
    Octree(OctreeCoordinates),
}

impl TreeCoordinates {
    /// The level 0 coordinate for a scheme
    pub fn root(scheme: SubdivisionScheme) -> Self {
        match scheme {
            SubdivisionScheme::Quadtree => Self::Quadtree(QuadtreeCoordinates::root()),
            SubdivisionScheme::Octree => Self::Octree(OctreeCoordinates::root()),
        }
    }

    /// Decode a Morton index within `level`
    pub fn from_index(scheme: SubdivisionScheme, level: u32, index: u64) -> Result<Self> {
        Ok(match scheme {
            SubdivisionScheme::Quadtree => {
                Self::Quadtree(QuadtreeCoordinates::from_index(level, index)?)
            }
            SubdivisionScheme::Octree => Self::Octree(OctreeCoordinates::from_index(level, index)?),
        })
    }

    pub fn scheme(&self) -> SubdivisionScheme {
        match self {
            Self::Quadtree(_) => SubdivisionScheme::Quadtree,
            Self::Octree(_) => SubdivisionScheme::Octree,
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            Self::Quadtree(c) => c.level(),
            Self::Octree(c) => c.level(),
        }
    }

    /// Axis values; `z` is 0 for quadtrees
    pub fn xyz(&self) -> [u32; 3] {
        match self {
            Self::Quadtree(c) => [c.x(), c.y(), 0],
            Self::Octree(c) => [c.x(), c.y(), c.z()],
        }
    }

    /// Fails on the root
    pub fn parent(&self) -> Result<Self> {
        Ok(match self {
            Self::Quadtree(c) => Self::Quadtree(c.parent()?),
            Self::Octree(c) => Self::Octree(c.parent()?),
        })
    }

    /// The `2^D` children in Morton order
    pub fn children(&self) -> Vec<Self> {
        match self {
            Self::Quadtree(c) => c.children().into_iter().map(Self::Quadtree).collect(),
            Self::Octree(c) => c.children().into_iter().map(Self::Octree).collect(),
        }
    }

    /// All coordinates from this one down to `max_level` inclusive
    pub fn descendants(&self, max_level: u32, depth_first: bool) -> Descendants {
        Descendants {
            root: *self,
            max_level: max_level.min(self.scheme().max_level()),
            depth_first,
        }
    }

    /// Morton index within this level
    pub fn to_index(&self) -> u64 {
        match self {
            Self::Quadtree(c) => c.to_index(),
            Self::Octree(c) => c.to_index(),
        }
    }

    /// Level-order index across the whole tree
    pub fn to_global_index(&self) -> u64 {
        match self {
            Self::Quadtree(c) => c.to_global_index(),
            Self::Octree(c) => c.to_global_index(),
        }
    }

    /// Coordinates of `self` relative to `root`, as if `root` were level 0.
    ///
    /// Fails when `self` is not `root` or one of its descendants.
    pub fn relative_to(&self, root: &Self) -> Result<Self> {
        let not_below = || {
            Error::OutOfRange(format!("{:?} is not a descendant of {:?}", self, root))
        };
        if self.scheme() != root.scheme() || self.level() < root.level() {
            return Err(not_below());
        }
        let delta = self.level() - root.level();
        let [x, y, z] = self.xyz();
        let [rx, ry, rz] = root.xyz();
        let shifted = |a: u32| (a as u64 >> delta) as u32;
        if shifted(x) != rx || shifted(y) != ry || shifted(z) != rz {
            return Err(not_below());
        }
        let local = |a: u32, r: u32| a - ((r as u64) << delta) as u32;
        Ok(match self {
            Self::Quadtree(_) => {
                Self::Quadtree(QuadtreeCoordinates::new(delta, local(x, rx), local(y, ry))?)
            }
            Self::Octree(_) => Self::Octree(OctreeCoordinates::new(
                delta,
                local(x, rx),
                local(y, ry),
                local(z, rz),
            )?),
        })
    }
}

impl std::fmt::Display for TreeCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quadtree(c) => write!(f, "{}-{}-{}", c.level(), c.x(), c.y()),
            Self::Octree(c) => write!(f, "{}-{}-{}-{}", c.level(), c.x(), c.y(), c.z()),
        }
    }
}

/// A re-iterable descendant sequence
///
/// Holds only the bounds; every call to [`Descendants::iter`] walks the
/// same coordinates in the same order.
#[derive(Clone, Copy, Debug)]
pub struct Descendants {
    root: TreeCoordinates,
    max_level: u32,
    depth_first: bool,
}

impl Descendants {
    pub fn iter(&self) -> DescendantsIter {
        let mut queue = VecDeque::new();
        if self.root.level() <= self.max_level {
            queue.push_back(self.root);
        }
        DescendantsIter {
            queue,
            max_level: self.max_level,
            depth_first: self.depth_first,
        }
    }
}

impl<'a> IntoIterator for &'a Descendants {
    type Item = TreeCoordinates;
    type IntoIter = DescendantsIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Single pass over a [`Descendants`] sequence
#[derive(Debug)]
pub struct DescendantsIter {
    queue: VecDeque<TreeCoordinates>,
    max_level: u32,
    depth_first: bool,
}

impl Iterator for DescendantsIter {
    type Item = TreeCoordinates;

    fn next(&mut self) -> Option<TreeCoordinates> {
        let current = if self.depth_first {
            self.queue.pop_back()?
        } else {
            self.queue.pop_front()?
        };
        if current.level() < self.max_level {
            let children = current.children();
            if self.depth_first {
                // Reversed so the first child is popped next
                self.queue.extend(children.into_iter().rev());
            } else {
                self.queue.extend(children);
            }
        }
        Some(current)
    }
}
