//! Tileset JSON model
//!
//! Only the fields that traversal reads or writes back are modelled.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tileset {
    pub asset: Asset,
    pub geometric_error: f64,
    pub root: Arc<Tile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
}

impl Tileset {
    /// Parse tileset JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let tileset: Self = serde_json::from_slice(data)?;
        if tileset.root.refine.is_none() {
            log::warn!("Tileset root has no refine, assuming REPLACE");
        }
        Ok(tileset)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tileset_version: Option<String>,
}

/// A literal tile node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub bounding_volume: BoundingVolume,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_request_volume: Option<BoundingVolume>,
    pub geometric_error: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refine: Option<Refine>,
    /// Column-major 4x4 matrix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<Content>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit_tiling: Option<ImplicitTiling>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Arc<Tile>>>,
}

impl Tile {
    /// `content` and `contents` as one list; having both is an error
    pub fn content_list(&self) -> Result<&[Content]> {
        match (&self.content, &self.contents) {
            (Some(_), Some(_)) => Err(Error::MalformedTileset(
                "tile has both content and contents".into(),
            )),
            (Some(content), None) => Ok(std::slice::from_ref(content)),
            (None, Some(contents)) => Ok(contents),
            (None, None) => Ok(&[]),
        }
    }

    pub fn child_tiles(&self) -> &[Arc<Tile>] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// JSON bounding volume; exactly one member is expected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingVolume {
    #[serde(rename = "box", skip_serializing_if = "Option::is_none")]
    pub r#box: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sphere: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Refine {
    Add,
    #[default]
    Replace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// For implicit roots this is a template URI
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_volume: Option<BoundingVolume>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataEntity>,
}

/// Metadata attached to a tile or content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntity {
    pub class: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Raw `implicitTiling` object; validated by
/// [`ImplicitTilingInfo::from_json`](crate::implicit::ImplicitTilingInfo::from_json)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplicitTiling {
    pub subdivision_scheme: String,
    pub subtree_levels: i64,
    pub available_levels: i64,
    pub subtrees: SubtreesUri,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtreesUri {
    pub uri: String,
}
