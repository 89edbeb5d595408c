//! Key/value stores backing the credential record
//!
//! [`FileStore`] keeps one JSON document per namespace and replaces it
//! atomically on commit. [`MemoryStore`] keeps everything in process and can
//! simulate a restart by dropping uncommitted changes.

use base64::Engine;
use cirrus_core_interface::{KeyValueStore, StoreError};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

type Records = BTreeMap<String, Vec<u8>>;

fn encode_records(records: &Records) -> Result<String, StoreError> {
    let encoded: BTreeMap<&str, String> = records
        .iter()
        .map(|(key, value)| {
            (
                key.as_str(),
                base64::engine::general_purpose::STANDARD.encode(value),
            )
        })
        .collect();
    serde_json::to_string_pretty(&encoded).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn decode_records(text: &str) -> Result<Records, StoreError> {
    let encoded: BTreeMap<String, String> =
        serde_json::from_str(text).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    encoded
        .into_iter()
        .map(|(key, value)| {
            base64::engine::general_purpose::STANDARD
                .decode(value.as_bytes())
                .map(|bytes| (key.clone(), bytes))
                .map_err(|e| StoreError::Corrupt(format!("record '{}': {}", key, e)))
        })
        .collect()
}

#[derive(Debug)]
struct FileState {
    records: Records,
    dirty: bool,
}

/// One namespace persisted as `<dir>/<namespace>.json`
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileStore {
    /// Open (creating the directory if needed) the namespace under `dir`
    pub fn open(dir: &Path, namespace: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Open {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(format!("{}.json", namespace));
        let (records, dirty) = match fs::read_to_string(&path) {
            Ok(text) => match decode_records(&text) {
                Ok(records) => (records, false),
                Err(e) => {
                    // the next commit replaces the unreadable document
                    warn!("Stored data in {} unreadable, starting empty: {}", path.display(), e);
                    (Records::new(), true)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Records::new(), false),
            Err(source) => return Err(StoreError::Open { path, source }),
        };

        debug!("Opened store {} ({} records)", path.display(), records.len());
        Ok(Self {
            path,
            state: Mutex::new(FileState { records, dirty }),
        })
    }

    fn state(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.state().records.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state();
        state.records.insert(key.to_string(), value.to_vec());
        state.dirty = true;
        Ok(())
    }

    fn erase(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.records.remove(key).is_some() {
            state.dirty = true;
        }
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        if !state.dirty {
            return Ok(());
        }

        let contents = encode_records(&state.records)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));

        // write beside the target, then rename over it
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(contents.as_bytes())?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|e| StoreError::Io(e.error))?;

        state.dirty = false;
        debug!("Committed store {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    staged: Records,
    committed: Records,
    commits: usize,
    fail_commits: bool,
}

/// In-process store with explicit staged and committed views
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop every uncommitted change, as a power cycle would
    pub fn simulate_restart(&self) {
        let mut state = self.state();
        state.staged = state.committed.clone();
    }

    /// Make subsequent commits fail with an I/O error
    pub fn fail_commits(&self, fail: bool) {
        self.state().fail_commits = fail;
    }

    /// Number of successful commits
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    /// Committed value for `key`, ignoring staged changes
    pub fn committed(&self, key: &str) -> Option<Vec<u8>> {
        self.state().committed.get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.state().staged.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.state().staged.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn erase(&self, key: &str) -> Result<(), StoreError> {
        self.state().staged.remove(key);
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.fail_commits {
            return Err(StoreError::Io(std::io::Error::other("commit rejected")));
        }
        state.committed = state.staged.clone();
        state.commits += 1;
        Ok(())
    }
}
