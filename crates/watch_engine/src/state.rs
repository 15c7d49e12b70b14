//! Persisted seen-store snapshots.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use watch_core::{NeighborhoodDirectory, SeenStore};
use watch_logging::{watch_debug, watch_info, watch_warn};

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path:?} is unreadable: {reason}")]
    CorruptState { path: PathBuf, reason: String },
    #[error("state file {0:?} was changed by another run since it was loaded")]
    ConcurrentModification(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("could not serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load/save seam between a run and wherever the snapshot lives.
pub trait SnapshotStore {
    fn load(&mut self, directory: &NeighborhoodDirectory) -> Result<SeenStore, StoreError>;
    fn save(&mut self, store: &SeenStore) -> Result<(), StoreError>;
}

type Fingerprint = Vec<u8>;

/// What the file looked like when it was last loaded or written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    NotYet,
    Absent,
    Present(Fingerprint),
}

/// JSON snapshot file replaced atomically on every save.
///
/// Save refuses to overwrite a file whose content changed since this handle
/// loaded it; that only happens when two runs overlap.
#[derive(Debug)]
pub struct JsonStateFile {
    writer: AtomicFileWriter,
    observed: Observed,
}

impl JsonStateFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(path),
            observed: Observed::NotYet,
        }
    }

    pub fn path(&self) -> &Path {
        self.writer.target()
    }

    fn read_current(&self) -> Result<Option<Vec<u8>>, io::Error> {
        match fs::read(self.path()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn corrupt(&self, reason: impl ToString) -> StoreError {
        StoreError::CorruptState {
            path: self.path().to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Sha256::digest(bytes).to_vec()
}

fn observe(bytes: Option<&[u8]>) -> Observed {
    match bytes {
        Some(bytes) => Observed::Present(fingerprint(bytes)),
        None => Observed::Absent,
    }
}

impl SnapshotStore for JsonStateFile {
    fn load(&mut self, directory: &NeighborhoodDirectory) -> Result<SeenStore, StoreError> {
        let Some(bytes) = self.read_current().map_err(|err| self.corrupt(err))? else {
            watch_info!("No state file at {:?}; starting with an empty store", self.path());
            self.observed = Observed::Absent;
            return Ok(SeenStore::new());
        };

        let document: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|err| self.corrupt(err))?;
        let (store, migration) =
            SeenStore::from_document(document, directory).map_err(|err| self.corrupt(err))?;
        if !migration.is_empty() {
            watch_info!(
                "Migrated legacy state: {} entries re-keyed, {} collisions skipped",
                migration.rekeyed,
                migration.collisions
            );
        }
        if migration.collisions > 0 {
            watch_warn!(
                "{} legacy entries in {:?} shared a token and were dropped",
                migration.collisions,
                self.path()
            );
        }

        self.observed = observe(Some(&bytes));
        watch_info!("Loaded {} listings from {:?}", store.len(), self.path());
        Ok(store)
    }

    fn save(&mut self, store: &SeenStore) -> Result<(), StoreError> {
        if self.observed != Observed::NotYet {
            let current = self.read_current()?;
            if observe(current.as_deref()) != self.observed {
                return Err(StoreError::ConcurrentModification(self.path().to_path_buf()));
            }
        }

        let mut bytes = serde_json::to_vec_pretty(store)?;
        bytes.push(b'\n');
        self.writer.write(&bytes)?;
        self.observed = observe(Some(&bytes));
        watch_debug!("Saved {} listings to {:?}", store.len(), self.path());
        Ok(())
    }
}

/// Keeps the snapshot in memory; used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Option<SeenStore>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(store: SeenStore) -> Self {
        Self {
            snapshot: Some(store),
            saves: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&SeenStore> {
        self.snapshot.as_ref()
    }

    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&mut self, _directory: &NeighborhoodDirectory) -> Result<SeenStore, StoreError> {
        Ok(self.snapshot.clone().unwrap_or_default())
    }

    fn save(&mut self, store: &SeenStore) -> Result<(), StoreError> {
        self.snapshot = Some(store.clone());
        self.saves += 1;
        Ok(())
    }
}
