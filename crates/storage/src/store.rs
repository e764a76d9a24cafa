//! File-backed snapshot store.
//!
//! The state file is never rewritten in place. A save writes a temp file in
//! the data directory, syncs it and renames it over the previous file, so a
//! crash leaves either the old state or the new one.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::snapshot::{NodeSnapshot, StoredState};
use crate::Result;

/// Name of the state file inside the data directory
pub const STATE_FILE_NAME: &str = "state.json";

/// Snapshot store rooted at a data directory
pub struct FileStore {
    dir: PathBuf,
    path: PathBuf,
    /// Serializes writers
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store, creating the data directory if needed
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let path = dir.join(STATE_FILE_NAME);
        info!(path = %path.display(), "state store opened");
        Ok(Self {
            dir,
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A state file exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the stored snapshot, `None` when nothing has been saved yet
    pub fn load(&self) -> Result<Option<NodeSnapshot>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let stored: StoredState = serde_json::from_reader(BufReader::new(file))?;
        let height = stored.height;
        let snapshot = stored.open()?;
        info!(
            path = %self.path.display(),
            height,
            accounts = snapshot.ledger.accounts.len(),
            validators = snapshot.registry.validators.len(),
            "state loaded"
        );
        Ok(Some(snapshot))
    }

    /// Replace the stored snapshot
    pub fn save(&self, snapshot: NodeSnapshot) -> Result<()> {
        let stored = StoredState::seal(snapshot)?;
        let _guard = self.write_lock.lock();

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &stored)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(
            path = %self.path.display(),
            height = stored.height,
            digest = %stored.digest,
            "state saved"
        );
        Ok(())
    }
}
