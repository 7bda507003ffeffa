// src/graph/store.rs

use super::{AuthorEntry, AuthorRecord, FileEntry, FileRecord, Record};
use crate::error::{Error, Result};
use crate::timeline::CommitTimeline;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const GRAPH_VERSION: u32 = 2;

const MANIFEST: &str = "manifest.json";

/// How much of which history the stored graph covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub branch: String,
    /// Number of timeline commits already folded into the graph
    pub processed: usize,
    /// Last processed commit
    pub head: Option<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest { version: GRAPH_VERSION, branch: String::new(), processed: 0, head: None }
    }
}

/// History graph with one JSON document per author and per file.
///
/// Records are loaded on first use and cached in concurrent maps, so any
/// number of workers can read through a shared reference. Only the
/// sequential builder appends, through `&mut self`.
pub struct GraphStore {
    root: Option<PathBuf>,
    manifest: Manifest,
    authors: DashMap<String, Arc<AuthorRecord>>,
    files: DashMap<String, Arc<FileRecord>>,
    dirty_authors: HashSet<String>,
    dirty_files: HashSet<String>,
}

impl GraphStore {
    /// A graph that lives only as long as this value.
    pub fn in_memory() -> Self {
        GraphStore {
            root: None,
            manifest: Manifest::default(),
            authors: DashMap::new(),
            files: DashMap::new(),
            dirty_authors: HashSet::new(),
            dirty_files: HashSet::new(),
        }
    }

    /// Open (or create) a graph rooted at `root`. Only the manifest is read eagerly.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(AuthorRecord::KIND))?;
        fs::create_dir_all(root.join(FileRecord::KIND))?;

        let manifest_path = root.join(MANIFEST);
        let manifest = if manifest_path.exists() {
            let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;
            if manifest.version != GRAPH_VERSION {
                return Err(Error::consistency(format!(
                    "graph at {} has version {}, expected {}",
                    root.display(),
                    manifest.version,
                    GRAPH_VERSION
                )));
            }
            manifest
        } else {
            Manifest::default()
        };
        debug!(root = %root.display(), processed = manifest.processed, "opened history graph");

        Ok(GraphStore { root: Some(root), manifest, ..GraphStore::in_memory() })
    }

    /// Drop every stored record and start over from an empty graph.
    pub fn reset(&mut self) -> Result<()> {
        self.authors.clear();
        self.files.clear();
        self.dirty_authors.clear();
        self.dirty_files.clear();
        self.manifest = Manifest::default();

        if let Some(root) = &self.root {
            for kind in [AuthorRecord::KIND, FileRecord::KIND] {
                let dir = root.join(kind);
                if dir.exists() {
                    fs::remove_dir_all(&dir)?;
                }
                fs::create_dir_all(&dir)?;
            }
            let manifest_path = root.join(MANIFEST);
            if manifest_path.exists() {
                fs::remove_file(manifest_path)?;
            }
            info!(root = %root.display(), "discarded stored history graph");
        }
        Ok(())
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn author(&self, name: &str) -> Result<Option<Arc<AuthorRecord>>> {
        self.lookup(&self.authors, name)
    }

    pub fn file(&self, path: &str) -> Result<Option<Arc<FileRecord>>> {
        self.lookup(&self.files, path)
    }

    /// Fail unless the graph was built over exactly `timeline`.
    pub fn ensure_covers(&self, timeline: &CommitTimeline) -> Result<()> {
        let head = timeline.head().map(|c| c.hash());
        if self.manifest.processed != timeline.len() || self.manifest.head != head {
            return Err(Error::consistency(format!(
                "history graph covers {} commits up to {:?}, but the timeline has {} commits up to {:?}",
                self.manifest.processed,
                self.manifest.head,
                timeline.len(),
                head
            )));
        }
        Ok(())
    }

    pub(crate) fn append_author(&mut self, name: &str, entry: AuthorEntry) -> Result<()> {
        let mut record = self.take(&self.authors, name)?;
        let appended = Arc::make_mut(&mut record).append(entry);
        self.authors.insert(name.to_string(), record);
        appended?;
        self.dirty_authors.insert(name.to_string());
        Ok(())
    }

    pub(crate) fn append_file(&mut self, path: &str, entry: FileEntry) -> Result<()> {
        let mut record = self.take(&self.files, path)?;
        let appended = Arc::make_mut(&mut record).append(entry);
        self.files.insert(path.to_string(), record);
        appended?;
        self.dirty_files.insert(path.to_string());
        Ok(())
    }

    pub(crate) fn advance(&mut self, branch: &str, processed: usize, head: String) {
        self.manifest.branch = branch.to_string();
        self.manifest.processed = processed;
        self.manifest.head = Some(head);
    }

    /// Write every record touched since the last flush, then the manifest.
    ///
    /// Until the manifest is replaced, readers treat the newer entries as absent.
    pub fn flush(&mut self) -> Result<()> {
        let Some(root) = self.root.clone() else {
            self.dirty_authors.clear();
            self.dirty_files.clear();
            return Ok(());
        };

        for name in self.dirty_authors.drain() {
            if let Some(record) = self.authors.get(&name) {
                write_json(&record_path::<AuthorRecord>(&root, &name), &**record)?;
            }
        }
        for path in self.dirty_files.drain() {
            if let Some(record) = self.files.get(&path) {
                write_json(&record_path::<FileRecord>(&root, &path), &**record)?;
            }
        }
        write_json(&root.join(MANIFEST), &self.manifest)?;
        debug!(processed = self.manifest.processed, "flushed history graph");
        Ok(())
    }

    fn lookup<R: Record>(&self, cache: &DashMap<String, Arc<R>>, key: &str) -> Result<Option<Arc<R>>> {
        if let Some(record) = cache.get(key) {
            return Ok(Some(Arc::clone(record.value())));
        }
        let Some(record) = self.read_record::<R>(key)? else {
            return Ok(None);
        };
        let record = Arc::new(record);
        Ok(Some(Arc::clone(cache.entry(key.to_string()).or_insert(record).value())))
    }

    fn take<R: Record>(&self, cache: &DashMap<String, Arc<R>>, key: &str) -> Result<Arc<R>> {
        if let Some((_, record)) = cache.remove(key) {
            return Ok(record);
        }
        Ok(Arc::new(self.read_record::<R>(key)?.unwrap_or_else(|| R::new(key))))
    }

    fn read_record<R: Record>(&self, key: &str) -> Result<Option<R>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let path = record_path::<R>(root, key);
        if !path.exists() {
            return Ok(None);
        }
        let mut record: R = serde_json::from_slice(&fs::read(&path)?)?;
        if record.key() != key {
            return Err(Error::consistency(format!(
                "{} holds `{}` where `{}` was expected",
                path.display(),
                record.key(),
                key
            )));
        }
        // Entries past the manifest were written by a run that never finished its flush
        let dropped = record.restore(self.manifest.processed);
        if dropped > 0 {
            debug!(key, dropped, "ignoring graph entries past the last completed run");
        }
        Ok(Some(record))
    }
}

fn record_path<R: Record>(root: &Path, key: &str) -> PathBuf {
    let digest = Sha256::digest(key.as_bytes());
    root.join(R::KIND).join(format!("{:x}.json", digest))
}

/// Write through a temporary sibling so a crash never leaves a torn record.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn entry(commit: &str, previous: Option<&str>, exp: u64) -> AuthorEntry {
        AuthorEntry {
            commit: commit.into(),
            seq: exp as usize - 1,
            previous: previous.map(String::from),
            timestamp: 0,
            exp,
            files: 2,
        }
    }

    #[test]
    fn records_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = GraphStore::open(dir.path()).unwrap();
            store.append_author("ada", entry("c1", None, 1)).unwrap();
            store
                .append_file(
                    "src/lib.rs",
                    FileEntry {
                        commit: "c1".into(),
                        seq: 0,
                        timestamp: 0,
                        previous: None,
                        authors: BTreeSet::from(["ada".to_string()]),
                        renamed_from: None,
                    },
                )
                .unwrap();
            store.advance("main", 1, "c1".into());
            store.flush().unwrap();
        }

        let store = GraphStore::open(dir.path()).unwrap();
        assert_eq!(store.manifest().processed, 1);
        assert_eq!(store.manifest().head.as_deref(), Some("c1"));
        let ada = store.author("ada").unwrap().unwrap();
        assert_eq!(ada.entry("c1").map(|e| e.exp), Some(1));
        let lib = store.file("src/lib.rs").unwrap().unwrap();
        assert!(lib.entry("c1").unwrap().authors.contains("ada"));
        assert!(store.author("bob").unwrap().is_none());
    }

    #[test]
    fn appends_extend_a_lazily_loaded_record() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = GraphStore::open(dir.path()).unwrap();
            store.append_author("ada", entry("c1", None, 1)).unwrap();
            store.advance("main", 1, "c1".into());
            store.flush().unwrap();
        }

        let mut store = GraphStore::open(dir.path()).unwrap();
        store.append_author("ada", entry("c2", Some("c1"), 2)).unwrap();
        let ada = store.author("ada").unwrap().unwrap();
        assert_eq!(ada.entries.len(), 2);
        assert!(store.append_author("ada", entry("c3", Some("c1"), 2)).is_err());
        // A rejected append leaves the cached record intact
        assert_eq!(store.author("ada").unwrap().unwrap().entries.len(), 2);
    }

    #[test]
    fn entries_past_the_manifest_are_ignored_on_load() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = GraphStore::open(dir.path()).unwrap();
            store.append_author("ada", entry("c1", None, 1)).unwrap();
            store.append_author("ada", entry("c2", Some("c1"), 2)).unwrap();
            // Records hold c2, but the manifest only vouches for c1
            store.advance("main", 1, "c1".into());
            store.flush().unwrap();
        }

        let mut store = GraphStore::open(dir.path()).unwrap();
        let ada = store.author("ada").unwrap().unwrap();
        assert_eq!(ada.entries.len(), 1);
        assert!(ada.entry("c2").is_none());
        store.append_author("ada", entry("c2", Some("c1"), 2)).unwrap();
    }

    #[test]
    fn reset_discards_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GraphStore::open(dir.path()).unwrap();
        store.append_author("ada", entry("c1", None, 1)).unwrap();
        store.advance("main", 1, "c1".into());
        store.flush().unwrap();

        store.reset().unwrap();
        assert_eq!(store.manifest(), &Manifest::default());
        assert!(store.author("ada").unwrap().is_none());
        assert!(!dir.path().join(MANIFEST).exists());
    }

    #[test]
    fn in_memory_flush_is_a_no_op() {
        let mut store = GraphStore::in_memory();
        store.append_author("ada", entry("c1", None, 1)).unwrap();
        store.flush().unwrap();
        assert!(store.root().is_none());
        assert!(store.author("ada").unwrap().is_some());
    }
}
