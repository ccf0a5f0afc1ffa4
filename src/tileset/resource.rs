//! Resource resolution for subtree files, buffers and external tilesets
//!
//! Traversal never touches storage directly; every byte it reads comes
//! through a [`ResourceResolver`]. Retry policy belongs to the resolver.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::core::Result;

/// Future returned by [`ResourceResolver::resolve_data`]
pub type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + 'a>>;

/// Source of raw resource bytes, addressed by relative URI
pub trait ResourceResolver: fmt::Debug + Send + Sync {
    /// Bytes of `uri`, or `None` when it does not exist
    fn resolve_data<'a>(&'a self, uri: &'a str) -> ResolveFuture<'a>;

    /// A resolver whose base is the directory containing `uri`
    fn derive(&self, uri: &str) -> Arc<dyn ResourceResolver>;
}

fn is_absolute(uri: &str) -> bool {
    uri.starts_with('/') || uri.contains("://")
}

/// Join a relative `uri` onto `base`, folding `.` and `..` segments
pub fn join_uri(base: &str, uri: &str) -> String {
    if is_absolute(uri) || base.is_empty() {
        return normalize(uri);
    }
    normalize(&format!("{}/{}", base.trim_end_matches('/'), uri))
}

/// The directory part of `uri` (empty when there is none)
pub fn parent_uri(uri: &str) -> String {
    match uri.rfind('/') {
        Some(pos) => uri[..pos].to_string(),
        None => String::new(),
    }
}

fn normalize(uri: &str) -> String {
    let (scheme, rest) = match uri.find("://") {
        Some(pos) => uri.split_at(pos + 3),
        None => ("", uri),
    };
    let leading = if rest.starts_with('/') { "/" } else { "" };
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if leading.is_empty() {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    format!("{}{}{}", scheme, leading, segments.join("/"))
}

/// Reads resources from a directory using tokio's file APIs
#[derive(Debug, Clone)]
pub struct FileResourceResolver {
    base_dir: PathBuf,
}

impl FileResourceResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl ResourceResolver for FileResourceResolver {
    fn resolve_data<'a>(&'a self, uri: &'a str) -> ResolveFuture<'a> {
        Box::pin(async move {
            let path = self.base_dir.join(uri);
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("Resource not found: {}", path.display());
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn derive(&self, uri: &str) -> Arc<dyn ResourceResolver> {
        let path = self.base_dir.join(uri);
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Arc::new(Self { base_dir })
    }
}

/// Serves resources from an in-memory map of normalized paths
#[derive(Clone, Default)]
pub struct MemoryResourceResolver {
    entries: Arc<HashMap<String, Arc<[u8]>>>,
    base: String,
}

impl MemoryResourceResolver {
    /// Build from `(path, bytes)` pairs; paths are relative to the root
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (normalize(k.as_ref()), Arc::from(v)))
            .collect();
        Self {
            entries: Arc::new(entries),
            base: String::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MemoryResourceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResourceResolver")
            .field("base", &self.base)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve_data<'a>(&'a self, uri: &'a str) -> ResolveFuture<'a> {
        let key = join_uri(&self.base, uri);
        let data = self.entries.get(&key).map(|bytes| bytes.to_vec());
        Box::pin(async move { Ok(data) })
    }

    fn derive(&self, uri: &str) -> Arc<dyn ResourceResolver> {
        Arc::new(Self {
            entries: Arc::clone(&self.entries),
            base: parent_uri(&join_uri(&self.base, uri)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    #[test]
    fn test_join_uri() {
        assert_eq!(join_uri("", "a/b.json"), "a/b.json");
        assert_eq!(join_uri("tiles", "./x/../y.glb"), "tiles/y.glb");
        assert_eq!(join_uri("a/b", "../../c"), "c");
        assert_eq!(join_uri("a", "../../c"), "../c");
        assert_eq!(join_uri("a", "/abs/c"), "/abs/c");
        assert_eq!(join_uri("a", "https://host/x/../y"), "https://host/y");
    }

    #[test]
    fn test_parent_uri() {
        assert_eq!(parent_uri("a/b/c.subtree"), "a/b");
        assert_eq!(parent_uri("c.subtree"), "");
    }

    #[tokio::test]
    async fn test_memory_resolver_derive() {
        let resolver = MemoryResourceResolver::new([
            ("subtrees/0.0.0.subtree", vec![1u8]),
            ("subtrees/buffers/0.bin", vec![2u8]),
            ("external/tileset.json", vec![3u8]),
        ]);
        assert_eq!(resolver.resolve_data("subtrees/0.0.0.subtree").await.unwrap(), Some(vec![1]));
        assert_eq!(resolver.resolve_data("missing").await.unwrap(), None);

        let derived = resolver.derive("subtrees/0.0.0.subtree");
        assert_eq!(derived.resolve_data("buffers/0.bin").await.unwrap(), Some(vec![2]));
        assert_eq!(
            derived.resolve_data("../external/tileset.json").await.unwrap(),
            Some(vec![3])
        );
    }

    #[tokio::test]
    async fn test_file_resolver() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("sub")).await.unwrap();
        tokio::fs::write(dir.path().join("sub/data.bin"), [7u8, 8]).await.unwrap();

        let resolver = FileResourceResolver::new(dir.path());
        assert_eq!(resolver.resolve_data("sub/data.bin").await.unwrap(), Some(vec![7, 8]));
        assert_eq!(resolver.resolve_data("sub/none.bin").await.unwrap(), None);

        let derived = resolver.derive("sub/data.bin");
        assert_eq!(derived.resolve_data("data.bin").await.unwrap(), Some(vec![7, 8]));
    }

    #[tokio::test]
    async fn test_file_resolver_unreadable_is_error() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("sub/dir.bin")).await.unwrap();

        let resolver = FileResourceResolver::new(dir.path());
        // Exists but cannot be read as a file
        let err = resolver.resolve_data("sub/dir.bin").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
