//! Filesystem-backed source store: `<root>/<container>/<prefix>/.../<leaf>`.

use log::debug;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use walkdir::WalkDir;

use super::SourceStore;
use crate::engine::tools::{is_os_hidden_file, path_relative_to, path_to_key};
use crate::error::SourceError;
use crate::types::{ContinuationCursor, ListingPage, SourceObjectRef};

/// One container directory. Keys are listed in lexicographic order; the cursor is the last key returned.
///
/// A listing without a cursor walks the prefix once and snapshots the sorted names; later pages
/// of that prefix are sliced from the snapshot. The snapshot is dropped after the final page.
pub struct FsSourceStore {
    container_dir: PathBuf,
    listings: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl FsSourceStore {
    pub fn new(root: &Path, container: &str) -> Self {
        Self {
            container_dir: root.join(container),
            listings: Mutex::new(HashMap::new()),
        }
    }

    pub fn container_dir(&self) -> &Path {
        &self.container_dir
    }

    /// All object names under `prefix`, relative to the prefix directory, sorted.
    fn list_names(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        if !self.container_dir.is_dir() {
            return Err(SourceError::Fatal(format!(
                "container {} not found",
                self.container_dir.display()
            )));
        }
        let dir = self.container_dir.join(prefix);
        if !dir.is_dir() {
            // A day with no objects.
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let walker = WalkDir::new(&dir)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_os_hidden_file(e.path()));
        for entry in walker {
            let entry = entry.map_err(|e| SourceError::Transient(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(rel) = path_relative_to(entry.path(), &dir) {
                names.push(path_to_key(&rel));
            }
        }
        names.sort_unstable();
        debug!("Walked {}: {} object(s)", dir.display(), names.len());
        Ok(names)
    }

    /// Sorted names for `prefix`. A fresh listing (`restart`) always walks the directory.
    fn snapshot(&self, prefix: &str, restart: bool) -> Result<Arc<Vec<String>>, SourceError> {
        if !restart
            && let Some(names) = self.lock_listings()?.get(prefix)
        {
            return Ok(Arc::clone(names));
        }
        let names = Arc::new(self.list_names(prefix)?);
        self.lock_listings()?
            .insert(prefix.to_string(), Arc::clone(&names));
        Ok(names)
    }

    fn lock_listings(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, Arc<Vec<String>>>>, SourceError> {
        self.listings
            .lock()
            .map_err(|_| SourceError::Fatal("listing cache mutex poisoned".into()))
    }
}

impl SourceStore for FsSourceStore {
    fn list_page(
        &self,
        prefix: &str,
        cursor: Option<&ContinuationCursor>,
        max_items: usize,
    ) -> Result<ListingPage, SourceError> {
        let names = self.snapshot(prefix, cursor.is_none())?;
        let start = match cursor {
            Some(c) => names.partition_point(|n| n.as_str() <= c.as_str()),
            None => 0,
        };
        let end = start.saturating_add(max_items.max(1)).min(names.len());
        let items = names[start..end]
            .iter()
            .map(|name| SourceObjectRef::new(prefix, name.as_str()))
            .collect();
        let continuation = (end < names.len()).then(|| ContinuationCursor::new(&names[end - 1]));
        if continuation.is_none() {
            self.lock_listings()?.remove(prefix);
        }
        Ok(ListingPage {
            items,
            continuation,
        })
    }

    fn download(&self, object: &SourceObjectRef) -> Result<Vec<u8>, SourceError> {
        let path = self.container_dir.join(&object.prefix).join(&object.name);
        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                SourceError::Fatal(format!("{}: {}", path.display(), e))
            }
            _ => SourceError::Transient(format!("{}: {}", path.display(), e)),
        })
    }
}
