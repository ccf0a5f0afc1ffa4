//! Subtree file model and binary framing
//!
//! A binary subtree file is a 24 byte header, a JSON chunk, padding to an
//! 8 byte boundary, then an optional binary chunk. Files without the `subt`
//! magic are JSON-only subtrees whose buffers are all external.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Magic bytes at the start of a binary subtree file
pub const SUBTREE_MAGIC: [u8; 4] = *b"subt";
/// Supported binary subtree version
pub const SUBTREE_VERSION: u32 = 1;
/// Size of the binary header in bytes
pub const SUBTREE_HEADER_LENGTH: usize = 24;

/// Binary header, little-endian on disk
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SubtreeHeader {
    magic: [u8; 4],
    version: u32,
    json_byte_length: u64,
    binary_byte_length: u64,
}

/// A read-only view into a shared byte buffer
///
/// Cloning or slicing never copies the underlying bytes.
#[derive(Clone)]
pub struct BufferSlice {
    data: Arc<[u8]>,
    range: Range<usize>,
}

impl BufferSlice {
    /// View over the whole of `data`
    pub fn new(data: Arc<[u8]>) -> Self {
        let range = 0..data.len();
        Self { data, range }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::new(data.into())
    }

    /// Sub-view relative to this view; `None` if it does not fit
    pub fn slice(&self, offset: u64, length: u64) -> Option<Self> {
        let end = offset.checked_add(length)?;
        if end > self.len() as u64 {
            return None;
        }
        let start = self.range.start + offset as usize;
        Some(Self {
            data: Arc::clone(&self.data),
            range: start..start + length as usize,
        })
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[self.range.clone()]
    }
}

impl fmt::Debug for BufferSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSlice")
            .field("range", &self.range)
            .finish()
    }
}

/// JSON part of a subtree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtree {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<SubtreeBuffer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<SubtreeBufferView>,
    pub tile_availability: AvailabilityDescriptor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_availability: Vec<AvailabilityDescriptor>,
    pub child_subtree_availability: AvailabilityDescriptor,
    /// Property tables, decoded by an external metadata codec
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_tables: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_metadata: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_metadata: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtree_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeBuffer {
    pub byte_length: u64,
    /// External file; absent means the binary chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeBufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: u64,
    pub byte_length: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `{ constant: 0|1 }` or `{ bufferView: n }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDescriptor {
    /// Older files name this `bitstream`
    #[serde(alias = "bitstream", skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_count: Option<u64>,
}

/// Where an availability's bits come from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvailabilitySource {
    Constant(bool),
    BufferView(usize),
}

impl AvailabilityDescriptor {
    pub fn constant(available: bool) -> Self {
        Self {
            constant: Some(available as u8),
            ..Default::default()
        }
    }

    pub fn buffer_view(index: usize) -> Self {
        Self {
            buffer_view: Some(index),
            ..Default::default()
        }
    }

    /// Exactly one of `constant` and `bufferView` must be set
    pub fn source(&self) -> std::result::Result<AvailabilitySource, String> {
        match (self.constant, self.buffer_view) {
            (Some(_), Some(_)) => Err("availability has both constant and bufferView".into()),
            (Some(0), None) => Ok(AvailabilitySource::Constant(false)),
            (Some(1), None) => Ok(AvailabilitySource::Constant(true)),
            (Some(other), None) => Err(format!("availability constant must be 0 or 1, found {}", other)),
            (None, Some(view)) => Ok(AvailabilitySource::BufferView(view)),
            (None, None) => Err("availability has neither constant nor bufferView".into()),
        }
    }
}

/// A subtree file split into its JSON model and binary chunk
#[derive(Debug, Clone)]
pub struct SubtreeFile {
    pub subtree: Subtree,
    /// Binary chunk; `None` for JSON-only files or an empty chunk
    pub binary: Option<BufferSlice>,
}

impl SubtreeFile {
    /// Split and decode the raw bytes of a subtree file.
    ///
    /// `uri` only labels errors.
    pub fn parse(data: Vec<u8>, uri: &str) -> Result<Self> {
        if !data.starts_with(&SUBTREE_MAGIC) {
            let subtree = serde_json::from_slice(&data)
                .map_err(|e| Error::malformed_subtree(uri, format!("invalid JSON: {}", e)))?;
            return Ok(Self { subtree, binary: None });
        }
        if data.len() < SUBTREE_HEADER_LENGTH {
            return Err(Error::malformed_subtree(uri, "truncated header"));
        }

        let header: SubtreeHeader = bytemuck::pod_read_unaligned(&data[..SUBTREE_HEADER_LENGTH]);
        let version = u32::from_le(header.version);
        if version != SUBTREE_VERSION {
            return Err(Error::malformed_subtree(uri, format!("unsupported version {}", version)));
        }
        let json_length = u64::from_le(header.json_byte_length);
        let binary_length = u64::from_le(header.binary_byte_length);

        let json_end = (SUBTREE_HEADER_LENGTH as u64)
            .checked_add(json_length)
            .filter(|end| *end <= data.len() as u64)
            .ok_or_else(|| Error::malformed_subtree(uri, "JSON chunk exceeds file length"))?;
        let binary_start = json_end.next_multiple_of(8);

        let data: Arc<[u8]> = data.into();
        let json = &data[SUBTREE_HEADER_LENGTH..json_end as usize];
        let subtree = serde_json::from_slice(json)
            .map_err(|e| Error::malformed_subtree(uri, format!("invalid JSON: {}", e)))?;

        let binary = if binary_length == 0 {
            None
        } else {
            let slice = BufferSlice::new(Arc::clone(&data))
                .slice(binary_start, binary_length)
                .ok_or_else(|| Error::malformed_subtree(uri, "binary chunk exceeds file length"))?;
            Some(slice)
        };

        Ok(Self { subtree, binary })
    }

    /// Build from an already separated JSON chunk and binary chunk
    pub fn from_chunks(json: &[u8], binary: Option<BufferSlice>, uri: &str) -> Result<Self> {
        let subtree = serde_json::from_slice(json)
            .map_err(|e| Error::malformed_subtree(uri, format!("invalid JSON: {}", e)))?;
        Ok(Self { subtree, binary })
    }
}

/// Encode a binary subtree file. Used by writers and tests.
pub fn encode_subtree(subtree: &Subtree, binary: &[u8]) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec(subtree)?;
    // Pad so that the binary chunk starts on an 8 byte boundary
    while (SUBTREE_HEADER_LENGTH + json.len()) % 8 != 0 {
        json.push(b' ');
    }
    let mut padded_binary = binary.to_vec();
    padded_binary.resize(binary.len().next_multiple_of(8), 0);

    let header = SubtreeHeader {
        magic: SUBTREE_MAGIC,
        version: SUBTREE_VERSION.to_le(),
        json_byte_length: (json.len() as u64).to_le(),
        binary_byte_length: (padded_binary.len() as u64).to_le(),
    };

    let mut out = Vec::with_capacity(SUBTREE_HEADER_LENGTH + json.len() + padded_binary.len());
    out.extend_from_slice(bytemuck::bytes_of(&header));
    out.extend_from_slice(&json);
    out.extend_from_slice(&padded_binary);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Subtree {
        Subtree {
            buffers: vec![SubtreeBuffer { byte_length: 3, ..Default::default() }],
            buffer_views: vec![SubtreeBufferView { buffer: 0, byte_offset: 2, byte_length: 1, name: None }],
            tile_availability: AvailabilityDescriptor::constant(true),
            child_subtree_availability: AvailabilityDescriptor::buffer_view(0),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_binary_file() {
        let bytes = encode_subtree(&sample(), &[1, 2, 3]).unwrap();
        assert_eq!(&bytes[..4], b"subt");

        let file = SubtreeFile::parse(bytes, "a.subtree").unwrap();
        assert_eq!(file.subtree.buffer_views[0].byte_offset, 2);
        let binary = file.binary.unwrap();
        assert_eq!(binary.len(), 8);
        assert_eq!(&binary.as_bytes()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_parse_json_only_file() {
        let json = br#"{
            "buffers": [{ "byteLength": 1, "uri": "avail.bin" }],
            "bufferViews": [{ "buffer": 0, "byteLength": 1 }],
            "tileAvailability": { "bitstream": 0, "availableCount": 3 },
            "childSubtreeAvailability": { "constant": 0 }
        }"#;
        let file = SubtreeFile::parse(json.to_vec(), "a.json").unwrap();
        assert!(file.binary.is_none());
        assert_eq!(file.subtree.tile_availability.buffer_view, Some(0));
        assert_eq!(file.subtree.tile_availability.available_count, Some(3));
        assert_eq!(file.subtree.buffers[0].uri.as_deref(), Some("avail.bin"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            SubtreeFile::parse(b"not json".to_vec(), "x"),
            Err(Error::MalformedSubtree { .. })
        ));

        let mut bytes = encode_subtree(&sample(), &[]).unwrap();
        bytes[4] = 2;
        assert!(SubtreeFile::parse(bytes, "x").is_err());

        let mut bytes = encode_subtree(&sample(), &[1, 2, 3]).unwrap();
        bytes.truncate(bytes.len() - 4);
        let err = SubtreeFile::parse(bytes, "cut.subtree").unwrap_err();
        assert!(err.to_string().contains("cut.subtree"));
    }

    #[test]
    fn test_descriptor_source() {
        assert_eq!(
            AvailabilityDescriptor::constant(false).source(),
            Ok(AvailabilitySource::Constant(false))
        );
        assert_eq!(
            AvailabilityDescriptor::buffer_view(4).source(),
            Ok(AvailabilitySource::BufferView(4))
        );
        let both = AvailabilityDescriptor {
            buffer_view: Some(0),
            constant: Some(1),
            available_count: None,
        };
        assert!(both.source().is_err());
        assert!(AvailabilityDescriptor::default().source().is_err());
        assert!(AvailabilityDescriptor { constant: Some(2), ..Default::default() }.source().is_err());
    }

    #[test]
    fn test_slice_is_bounds_checked() {
        let slice = BufferSlice::from_vec(vec![0, 1, 2, 3, 4]);
        let inner = slice.slice(1, 3).unwrap();
        assert_eq!(inner.as_bytes(), &[1, 2, 3]);
        assert_eq!(inner.slice(2, 1).unwrap().as_bytes(), &[3]);
        assert!(inner.slice(2, 2).is_none());
        assert!(slice.slice(u64::MAX, 2).is_none());
    }
}
