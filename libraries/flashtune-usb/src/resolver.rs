//! Resolution of document URIs against a tree of documents
//!
//! The tree is abstract so the same walk works for any backing store. It
//! only has to open roots, look up a child by name and create children.

use crate::error::{Result, UsbError};
use crate::paths::{GrantedRoots, RootMatch};
use async_trait::async_trait;

/// A browsable, permission-gated document tree
#[async_trait]
pub trait DocumentTree: Send + Sync {
    /// Handle to one document (file or directory)
    type Doc: Clone + Send + Sync;

    /// Open a granted root directory. `None` when it is no longer reachable.
    async fn open_root(&self, root_uri: &str) -> Result<Option<Self::Doc>>;

    /// Open a URI that is not under any granted root, as a single document
    /// or as a tree of its own
    async fn open_direct(&self, uri: &str) -> Result<Option<Self::Doc>>;

    /// Look up a direct child by display name
    async fn find_child(&self, parent: &Self::Doc, name: &str) -> Result<Option<Self::Doc>>;

    async fn create_directory(&self, parent: &Self::Doc, name: &str) -> Result<Self::Doc>;

    async fn create_file(&self, parent: &Self::Doc, name: &str) -> Result<Self::Doc>;

    fn is_directory(&self, doc: &Self::Doc) -> bool;
}

/// Find an existing document. Never creates anything.
pub async fn resolve_existing<T: DocumentTree + ?Sized>(
    tree: &T,
    roots: &GrantedRoots,
    uri: &str,
) -> Result<T::Doc> {
    match roots.match_root(uri) {
        Some(matched) => walk(tree, &matched, uri).await,
        None => tree
            .open_direct(uri)
            .await?
            .ok_or_else(|| UsbError::not_found(uri)),
    }
}

/// Find an existing document under a granted root.
///
/// URIs outside every granted root are refused rather than opened directly,
/// so renames and deletions stay inside the volume.
pub async fn resolve_granted<T: DocumentTree + ?Sized>(
    tree: &T,
    roots: &GrantedRoots,
    uri: &str,
) -> Result<T::Doc> {
    let matched = roots
        .match_root(uri)
        .ok_or_else(|| UsbError::PermissionDenied {
            uri: uri.to_string(),
        })?;
    walk(tree, &matched, uri).await
}

async fn walk<T: DocumentTree + ?Sized>(
    tree: &T,
    matched: &RootMatch<'_>,
    uri: &str,
) -> Result<T::Doc> {
    let mut current = tree
        .open_root(matched.root)
        .await?
        .ok_or_else(|| UsbError::not_found(matched.root))?;

    for segment in &matched.segments {
        if !tree.is_directory(&current) {
            return Err(UsbError::not_found(uri));
        }
        current = tree
            .find_child(&current, segment)
            .await?
            .ok_or_else(|| UsbError::not_found(uri))?;
    }

    Ok(current)
}

/// Find or create the file at `uri`, creating missing directories on the way.
///
/// An existing file is reused; an existing directory is an error. Writing
/// requires the URI to sit under a granted root.
pub async fn resolve_for_write<T: DocumentTree + ?Sized>(
    tree: &T,
    roots: &GrantedRoots,
    uri: &str,
) -> Result<T::Doc> {
    let matched = roots
        .match_root(uri)
        .ok_or_else(|| UsbError::PermissionDenied {
            uri: uri.to_string(),
        })?;

    let Some((file_name, directories)) = matched.segments.split_last() else {
        return Err(UsbError::invalid_uri(uri, "no file name after the volume root"));
    };

    let mut current = tree
        .open_root(matched.root)
        .await?
        .ok_or_else(|| UsbError::not_found(matched.root))?;

    for name in directories {
        current = match tree.find_child(&current, name).await? {
            Some(child) if tree.is_directory(&child) => child,
            Some(_) => {
                return Err(UsbError::NotADirectory {
                    uri: uri.to_string(),
                })
            }
            None => tree.create_directory(&current, name).await?,
        };
    }

    match tree.find_child(&current, file_name).await? {
        Some(existing) if tree.is_directory(&existing) => Err(UsbError::IsDirectory {
            uri: uri.to_string(),
        }),
        Some(existing) => Ok(existing),
        None => tree.create_file(&current, file_name).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory tree keyed by node id
    #[derive(Default)]
    struct MemTree {
        nodes: Mutex<Vec<(String, bool, HashMap<String, usize>)>>,
        roots: HashMap<String, usize>,
    }

    impl MemTree {
        fn with_root(root: &str) -> Self {
            let mut tree = Self::default();
            tree.nodes
                .lock()
                .unwrap()
                .push((String::new(), true, HashMap::new()));
            tree.roots.insert(root.to_string(), 0);
            tree
        }

        fn add(&self, parent: usize, name: &str, is_dir: bool) -> usize {
            let mut nodes = self.nodes.lock().unwrap();
            nodes.push((name.to_string(), is_dir, HashMap::new()));
            let id = nodes.len() - 1;
            nodes[parent].2.insert(name.to_string(), id);
            id
        }

        fn count(&self) -> usize {
            self.nodes.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DocumentTree for MemTree {
        type Doc = usize;

        async fn open_root(&self, root_uri: &str) -> Result<Option<usize>> {
            Ok(self.roots.get(root_uri).copied())
        }

        async fn open_direct(&self, _uri: &str) -> Result<Option<usize>> {
            Ok(None)
        }

        async fn find_child(&self, parent: &usize, name: &str) -> Result<Option<usize>> {
            Ok(self.nodes.lock().unwrap()[*parent].2.get(name).copied())
        }

        async fn create_directory(&self, parent: &usize, name: &str) -> Result<usize> {
            Ok(self.add(*parent, name, true))
        }

        async fn create_file(&self, parent: &usize, name: &str) -> Result<usize> {
            Ok(self.add(*parent, name, false))
        }

        fn is_directory(&self, doc: &usize) -> bool {
            self.nodes.lock().unwrap()[*doc].1
        }
    }

    const ROOT: &str = "content://usb/tree/primary";

    fn roots() -> GrantedRoots {
        GrantedRoots::new(Some(ROOT), Vec::<String>::new())
    }

    #[tokio::test]
    async fn test_resolve_existing_walks_segments() {
        let tree = MemTree::with_root(ROOT);
        let music = tree.add(0, "Music", true);
        let song = tree.add(music, "A - B.mp3", false);

        let found = resolve_existing(&tree, &roots(), &format!("{}/Music/A%20-%20B.mp3", ROOT))
            .await
            .unwrap();
        assert_eq!(found, song);
    }

    #[tokio::test]
    async fn test_resolve_existing_never_creates() {
        let tree = MemTree::with_root(ROOT);
        let before = tree.count();

        let result = resolve_existing(&tree, &roots(), &format!("{}/Music/x.mp3", ROOT)).await;
        assert!(matches!(result, Err(UsbError::NotFound { .. })));
        assert_eq!(tree.count(), before);
    }

    #[tokio::test]
    async fn test_resolve_for_write_creates_intermediates() {
        let tree = MemTree::with_root(ROOT);

        let file = resolve_for_write(&tree, &roots(), &format!("{}/Music/Live/x.mp3", ROOT))
            .await
            .unwrap();
        assert!(!tree.is_directory(&file));

        let again = resolve_for_write(&tree, &roots(), &format!("{}/Music/Live/x.mp3", ROOT))
            .await
            .unwrap();
        assert_eq!(file, again);
        assert_eq!(tree.count(), 4);
    }

    #[tokio::test]
    async fn test_resolve_for_write_rejects_directory_target() {
        let tree = MemTree::with_root(ROOT);
        tree.add(0, "Music", true);

        let result = resolve_for_write(&tree, &roots(), &format!("{}/Music", ROOT)).await;
        assert!(matches!(result, Err(UsbError::IsDirectory { .. })));
    }

    #[tokio::test]
    async fn test_resolve_for_write_requires_granted_root() {
        let tree = MemTree::with_root(ROOT);

        let result = resolve_for_write(&tree, &roots(), "content://elsewhere/x.mp3").await;
        assert!(matches!(result, Err(UsbError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_resolve_granted_refuses_outside_roots() {
        let tree = MemTree::with_root(ROOT);
        let music = tree.add(0, "Music", true);

        let found = resolve_granted(&tree, &roots(), &format!("{}/Music", ROOT))
            .await
            .unwrap();
        assert_eq!(found, music);

        let result = resolve_granted(&tree, &roots(), "content://elsewhere/Music").await;
        assert!(matches!(result, Err(UsbError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_root_is_not_found() {
        let tree = MemTree::with_root("content://usb/tree/other");

        let result = resolve_existing(&tree, &roots(), &format!("{}/.musicdb", ROOT)).await;
        assert!(matches!(result, Err(UsbError::NotFound { .. })));
    }
}
