use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use directories::ProjectDirs;

use crate::clock::Clock;
use crate::session::Session;
use crate::snapshot::{Envelope, ExportDocument};
use crate::task::Task;

const KEY_TASK_PREFIX: &str = "task_";
const KEY_ACTIVE_TASK: &str = "active_task_id";

/// Fallible string key-value capability. Implementations degrade to
/// no-ops and absent results; persistence trouble is never fatal and the
/// trainer keeps running purely in memory.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory store for tests and `--fresh` runs.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: BTreeMap<String, String>,
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Store backed by a single JSON map file under the platform data dir.
/// Unreadable or unwritable files read as empty and write as no-ops.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    path: PathBuf,
}

impl FileKvStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "codetap") {
            pd.data_dir().join("progress.json")
        } else {
            PathBuf::from("codetap_progress.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(map) = serde_json::from_slice(&bytes) {
                return map;
            }
        }
        BTreeMap::new()
    }

    fn write_map(&self, map: &BTreeMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        if let Ok(data) = serde_json::to_vec_pretty(map) {
            let _ = fs::write(&self.path, data);
        }
    }
}

impl Default for FileKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map);
    }

    fn remove(&mut self, key: &str) {
        let mut map = self.read_map();
        if map.remove(key).is_some() {
            self.write_map(&map);
        }
    }
}

pub fn task_key(task_id: &str) -> String {
    format!("{KEY_TASK_PREFIX}{task_id}")
}

/// Save the session's envelope under its task id. Failures are silent.
pub fn save_session(store: &mut dyn KvStore, session: &Session, clock: &dyn Clock) {
    let envelope = Envelope::new(session.to_snapshot(clock));
    if let Ok(raw) = serde_json::to_string(&envelope) {
        store.set(&task_key(&session.task.id), &raw);
    }
}

pub fn load_envelope(store: &dyn KvStore, task_id: &str) -> Option<Envelope> {
    Envelope::parse(&store.get(&task_key(task_id))?)
}

/// Load the saved session for a task, along with when it was saved.
/// Absent, corrupt, stale-version, or mismatched envelopes read as None.
pub fn load_session(store: &dyn KvStore, task: &Task) -> Option<(Session, DateTime<Local>)> {
    let envelope = load_envelope(store, &task.id)?;
    if envelope.payload.task_id != task.id {
        return None;
    }
    Some((
        Session::from_snapshot(task.clone(), &envelope.payload),
        envelope.saved_at,
    ))
}

pub fn clear_session(store: &mut dyn KvStore, task_id: &str) {
    store.remove(&task_key(task_id));
}

/// Remember the open task so a restart lands back on it.
pub fn save_active_task_id(store: &mut dyn KvStore, task_id: &str) {
    store.set(KEY_ACTIVE_TASK, task_id);
}

pub fn load_active_task_id(store: &dyn KvStore) -> Option<String> {
    store.get(KEY_ACTIVE_TASK)
}

/// Write the one-way export dump as pretty JSON.
pub fn export_session(session: &Session, clock: &dyn Clock, path: &Path) -> io::Result<()> {
    let doc = ExportDocument {
        task_id: session.task.id.clone(),
        saved_at: Local::now(),
        session: session.to_snapshot(clock),
    };
    let data = serde_json::to_vec_pretty(&doc)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, data)
}
