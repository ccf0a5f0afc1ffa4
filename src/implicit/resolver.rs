//! Subtree binary resolver
//!
//! Binds subtree buffers to the binary chunk or to external files, slices
//! buffer views out of them, and builds the three kinds of availability.

use std::sync::Arc;

use crate::core::{Error, Result};
use crate::implicit::availability::{AvailabilityInfo, BufferAvailability, ConstantAvailability};
use crate::implicit::subtree::{AvailabilityDescriptor, AvailabilitySource, BufferSlice, Subtree, SubtreeFile};
use crate::implicit::tiling::SubdivisionScheme;
use crate::tileset::ResourceResolver;

/// A subtree with all buffers bound and availability decoded
#[derive(Debug)]
pub struct ResolvedSubtree {
    uri: String,
    subtree: Subtree,
    buffers: Vec<BufferSlice>,
    tile_availability: Arc<dyn AvailabilityInfo>,
    content_availability: Vec<Arc<dyn AvailabilityInfo>>,
    child_subtree_availability: Arc<dyn AvailabilityInfo>,
}

impl ResolvedSubtree {
    /// Resolve a parsed subtree file.
    ///
    /// `resolver` must be based at the subtree file's directory, since
    /// buffer URIs are relative to it. `uri` names the subtree in errors.
    pub async fn resolve(
        file: SubtreeFile,
        scheme: SubdivisionScheme,
        subtree_levels: u32,
        resolver: &dyn ResourceResolver,
        uri: &str,
    ) -> Result<Self> {
        let SubtreeFile { subtree, binary } = file;
        let buffers = bind_buffers(&subtree, binary, resolver, uri).await?;

        let tile_length = scheme.nodes_in_levels(subtree_levels);
        let child_length = scheme.nodes_in_level(subtree_levels);

        let build = |descriptor: &AvailabilityDescriptor, length: u64, what: &str| {
            build_availability(&subtree, &buffers, descriptor, length, uri)
                .map_err(|e| match e {
                    Error::MalformedSubtree { uri, reason } => Error::MalformedSubtree {
                        uri,
                        reason: format!("{}: {}", what, reason),
                    },
                    other => other,
                })
        };

        let tile_availability = build(&subtree.tile_availability, tile_length, "tileAvailability")?;
        let content_availability = subtree
            .content_availability
            .iter()
            .map(|d| build(d, tile_length, "contentAvailability"))
            .collect::<Result<Vec<_>>>()?;
        let child_subtree_availability = build(
            &subtree.child_subtree_availability,
            child_length,
            "childSubtreeAvailability",
        )?;

        Ok(Self {
            uri: uri.to_string(),
            subtree,
            buffers,
            tile_availability,
            content_availability,
            child_subtree_availability,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn subtree(&self) -> &Subtree {
        &self.subtree
    }

    /// Bytes of a buffer view, bounds-checked against its buffer
    pub fn buffer_view_data(&self, index: usize) -> Result<BufferSlice> {
        buffer_view_slice(&self.subtree, &self.buffers, index, &self.uri)
    }

    pub fn tile_availability(&self) -> &Arc<dyn AvailabilityInfo> {
        &self.tile_availability
    }

    pub fn content_availability(&self) -> &[Arc<dyn AvailabilityInfo>] {
        &self.content_availability
    }

    pub fn child_subtree_availability(&self) -> &Arc<dyn AvailabilityInfo> {
        &self.child_subtree_availability
    }
}

async fn bind_buffers(
    subtree: &Subtree,
    binary: Option<BufferSlice>,
    resolver: &dyn ResourceResolver,
    uri: &str,
) -> Result<Vec<BufferSlice>> {
    let mut internal_bound = false;
    let mut buffers = Vec::with_capacity(subtree.buffers.len());

    for (index, buffer) in subtree.buffers.iter().enumerate() {
        let data = match &buffer.uri {
            None => {
                if internal_bound {
                    return Err(Error::malformed_subtree(
                        uri,
                        "more than one buffer without a uri",
                    ));
                }
                internal_bound = true;
                binary.clone().ok_or_else(|| {
                    Error::malformed_subtree(uri, format!("buffer {} needs a binary chunk", index))
                })?
            }
            Some(buffer_uri) => {
                log::debug!("Resolving external buffer {} of {}", buffer_uri, uri);
                let context = || format!("buffer {} of subtree {}", index, uri);
                let bytes = resolver
                    .resolve_data(buffer_uri)
                    .await
                    .map_err(|e| Error::unresolvable(buffer_uri.as_str(), format!("{}: {}", context(), e)))?
                    .ok_or_else(|| Error::unresolvable(buffer_uri.as_str(), context()))?;
                BufferSlice::from_vec(bytes)
            }
        };

        if (data.len() as u64) < buffer.byte_length {
            return Err(Error::malformed_subtree(
                uri,
                format!(
                    "buffer {} declares {} bytes but only {} are present",
                    index,
                    buffer.byte_length,
                    data.len()
                ),
            ));
        }
        buffers.push(data);
    }
    Ok(buffers)
}

fn buffer_view_slice(
    subtree: &Subtree,
    buffers: &[BufferSlice],
    index: usize,
    uri: &str,
) -> Result<BufferSlice> {
    let view = subtree
        .buffer_views
        .get(index)
        .ok_or_else(|| Error::malformed_subtree(uri, format!("no bufferView {}", index)))?;
    let (declared, data) = subtree
        .buffers
        .get(view.buffer)
        .zip(buffers.get(view.buffer))
        .ok_or_else(|| {
            Error::malformed_subtree(uri, format!("bufferView {} refers to missing buffer {}", index, view.buffer))
        })?;

    let out_of_bounds = || {
        Error::malformed_subtree(
            uri,
            format!(
                "bufferView {} range {}+{} exceeds buffer {} of {} bytes",
                index, view.byte_offset, view.byte_length, view.buffer, declared.byte_length
            ),
        )
    };
    let end = view
        .byte_offset
        .checked_add(view.byte_length)
        .ok_or_else(out_of_bounds)?;
    if end > declared.byte_length {
        return Err(out_of_bounds());
    }
    data.slice(view.byte_offset, view.byte_length)
        .ok_or_else(out_of_bounds)
}

fn build_availability(
    subtree: &Subtree,
    buffers: &[BufferSlice],
    descriptor: &AvailabilityDescriptor,
    length: u64,
    uri: &str,
) -> Result<Arc<dyn AvailabilityInfo>> {
    let source = descriptor
        .source()
        .map_err(|reason| Error::malformed_subtree(uri, reason))?;

    let availability: Arc<dyn AvailabilityInfo> = match source {
        AvailabilitySource::Constant(available) => {
            Arc::new(ConstantAvailability::new(length, available))
        }
        AvailabilitySource::BufferView(view) => {
            let bits = buffer_view_slice(subtree, buffers, view, uri)?;
            let availability = BufferAvailability::new(bits, length)
                .map_err(|e| Error::malformed_subtree(uri, e.to_string()))?;
            Arc::new(availability)
        }
    };

    if let Some(declared) = descriptor.available_count {
        let actual = availability.available_count();
        if declared != actual {
            log::warn!(
                "Subtree {} declares availableCount {} but {} bits are set",
                uri,
                declared,
                actual
            );
        }
    }
    Ok(availability)
}
