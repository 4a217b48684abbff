#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use herdbook_kernel_contracts::breeding::{EvaluationLogEntry, HISTORY_LOG_CAPACITY};
use herdbook_kernel_contracts::{ContractViolation, Validate};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] io::Error),
    #[error("history json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("history entry rejected: {0}")]
    ContractViolation(#[from] ContractViolation),
}

/// Most-recent-first evaluation journal capped at [`HISTORY_LOG_CAPACITY`].
///
/// Implementations serialize their own read-modify-write cycle so concurrent
/// appends never lose entries.
pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: EvaluationLogEntry) -> Result<(), HistoryError>;

    fn entries(&self) -> Result<Vec<EvaluationLogEntry>, HistoryError>;

    fn entries_for_animal(&self, animal_code: &str) -> Result<Vec<EvaluationLogEntry>, HistoryError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.involves(animal_code))
            .collect())
    }
}

fn prepend_bounded(entries: &mut Vec<EvaluationLogEntry>, entry: EvaluationLogEntry) {
    entries.insert(0, entry);
    entries.truncate(HISTORY_LOG_CAPACITY);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-append leaves the document itself intact, so the guard is still usable.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<EvaluationLogEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, entry: EvaluationLogEntry) -> Result<(), HistoryError> {
        entry.validate()?;
        prepend_bounded(&mut lock(&self.entries), entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<EvaluationLogEntry>, HistoryError> {
        Ok(lock(&self.entries).clone())
    }
}

/// One writer lock per backing file, shared by every store in the process.
fn document_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = lock(LOCKS.get_or_init(Default::default));
    Arc::clone(locks.entry(document_key(path)).or_default())
}

// Parent directory must already exist for symlinks to resolve.
fn document_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent).ok().map(|dir| dir.join(name)),
        _ => None,
    };
    resolved.unwrap_or(absolute)
}

/// History persisted as one pretty-printed JSON array. Writes go to a sibling
/// temp file that is renamed over the document, so readers never observe a
/// partial write. Stores opened on the same file share one writer lock.
#[derive(Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn default_local() -> Self {
        let path = env::var("HERDBOOK_BREEDING_HISTORY_PATH")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_history_path);
        Self::for_path(path)
    }

    pub fn for_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing, empty or corrupt documents read as an empty history. Only
    /// genuine I/O failures are returned.
    fn read_document(&self) -> Result<Vec<EvaluationLogEntry>, HistoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<EvaluationLogEntry>>(&raw) {
            Ok(mut entries) => {
                entries.truncate(HISTORY_LOG_CAPACITY);
                Ok(entries)
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "breeding history document is corrupt; starting from an empty history"
                );
                Ok(Vec::new())
            }
        }
    }

    fn ensure_parent_dir(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }

    fn write_document(&self, entries: &[EvaluationLogEntry]) -> Result<(), HistoryError> {
        let serialized = serde_json::to_vec_pretty(entries)?;
        atomic_write(&self.path, &serialized)?;
        Ok(())
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn append(&self, entry: EvaluationLogEntry) -> Result<(), HistoryError> {
        entry.validate()?;
        self.ensure_parent_dir()?;
        let write_lock = document_lock(&self.path);
        let _guard = lock(&*write_lock);
        let mut entries = self.read_document()?;
        prepend_bounded(&mut entries, entry);
        self.write_document(&entries)
    }

    fn entries(&self) -> Result<Vec<EvaluationLogEntry>, HistoryError> {
        self.read_document()
    }
}

fn default_history_path() -> PathBuf {
    if let Ok(xdg_data_home) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home)
            .join("herdbook")
            .join("breeding_history.json");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("herdbook")
            .join("breeding_history.json");
    }
    PathBuf::from(".herdbook").join("breeding_history.json")
}

fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "breeding_history.json".to_string());
    let tmp = path.with_file_name(format!(
        ".{name}.{}.{}.tmp",
        process::id(),
        WRITE_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    if let Err(err) = fs::write(&tmp, data) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).map_err(|err| {
        let _ = fs::remove_file(&tmp);
        err
    })
}
