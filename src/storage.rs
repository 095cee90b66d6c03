use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tracing::warn;

pub const DEFAULT_STATE_FILE: &str = ".mk-slots/storage.json";

/// String key-value storage in the spirit of browser `localStorage`.
pub trait KeyValueStore {
    /// retrieve the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// write or overwrite the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// A flat JSON object on disk, rewritten in full on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_store(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = read_entries(&self.path)?;
        Ok(entries.get(key).cloned())
    }

    /// A file that no longer parses is replaced rather than blocking every
    /// later write.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = match read_entries(&self.path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), ?err, "discarding unreadable storage file");
                BTreeMap::new()
            }
        };
        entries.insert(key.to_string(), value.to_string());
        write_entries(&self.path, &entries)
    }
}

fn ensure_store(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create storage directory {}", parent.display())
            })?;
        }
    }
    if !path.exists() {
        fs::write(path, b"{}").wrap_err_with(|| {
            format!("Failed to initialize storage file at {}", path.display())
        })?;
    }
    Ok(())
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>> {
    let data = fs::read(path).wrap_err("Failed to read storage file")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }
    let entries = serde_json::from_slice::<BTreeMap<String, String>>(&data)
        .wrap_err("Failed to parse storage JSON")?;
    Ok(entries)
}

fn write_entries(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let json =
        serde_json::to_vec_pretty(entries).wrap_err("Failed to serialize storage")?;
    let tmp = staging_path(path);
    fs::write(&tmp, json).wrap_err_with(|| {
        format!("Failed to write storage staging file {}", tmp.display())
    })?;
    fs::rename(&tmp, path).wrap_err("Failed to replace storage file")?;
    Ok(())
}

/// Sibling file the next contents are written to before the rename.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Shared in-memory store. Clones see the same entries, so a test can keep a
/// handle while the engine owns another.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.entries.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
        store
    }

    pub fn entries(&self) -> Arc<Mutex<HashMap<String, String>>> {
        self.entries.clone()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| eyre!("in-memory store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| eyre!("in-memory store lock poisoned"))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
