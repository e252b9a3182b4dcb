//! File-based note storage for moodlog.
//!
//! Stores each note's content as a plain text file next to a JSON index
//! holding the metadata:
//!
//! ```text
//! UserNotes/
//!   .lock                    # Lock file for mutations
//!   meta_info.json           # title -> {"date": ..., "emotion": [...]}
//!   Monday.txt
//!   Long day at work.txt
//! ```
//!
//! The index is pruned of entries whose content file is gone when the store
//! is opened and after every mutation. Content files without an index entry
//! are left alone and stay invisible.

use chrono::Local;
use fs2::FileExt;
use moodlog_core::{format_datetime, sanitize_title, Error, NoteInfo, NoteMeta, NoteStore};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the index document inside the notes directory.
pub const INDEX_FILE: &str = "meta_info.json";

const LOCK_FILE: &str = ".lock";
const NOTE_EXT: &str = "txt";

type Index = BTreeMap<String, NoteMeta>;

/// Either index shape found on disk.
#[derive(Deserialize)]
#[serde(untagged)]
enum IndexDocument {
    Map(Index),
    /// Early versions kept a list of entries whose title carried the
    /// `.txt` suffix and whose emotion could be a bare string.
    Legacy(Vec<LegacyEntry>),
}

#[derive(Deserialize)]
struct LegacyEntry {
    title: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    emotion: Option<LegacyEmotion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyEmotion {
    One(String),
    Many(Vec<String>),
}

impl IndexDocument {
    fn into_index(self) -> Index {
        match self {
            IndexDocument::Map(index) => index,
            IndexDocument::Legacy(entries) => entries
                .into_iter()
                .map(|entry| {
                    let title = entry
                        .title
                        .strip_suffix(".txt")
                        .unwrap_or(&entry.title)
                        .to_string();
                    let emotions = match entry.emotion {
                        Some(LegacyEmotion::One(e)) if !e.trim().is_empty() => vec![e],
                        Some(LegacyEmotion::Many(list)) => list,
                        _ => Vec::new(),
                    };
                    (
                        title,
                        NoteMeta {
                            date: entry.date,
                            emotions,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// File-based note store.
pub struct FilesStore {
    root: PathBuf,
}

impl FilesStore {
    /// Open a notes directory, creating it and an empty index if absent,
    /// and prune stale index entries.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .map_err(|e| Error::Storage(format!("Failed to create notes dir: {}", e)))?;

        let store = Self { root };

        let _lock = store.lock()?;
        if !store.index_path().exists() {
            tracing::info!(dir = %store.root.display(), "initializing empty note index");
            store.write_index(&Index::new())?;
        }
        let index = store.read_index()?;
        store.commit(index)?;

        Ok(store)
    }

    /// The notes directory this store manages.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquire an exclusive lock on the notes directory.
    fn lock(&self) -> Result<FileLock, Error> {
        let lock_path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| Error::Storage(format!("Failed to open lock file: {}", e)))?;

        file.lock_exclusive()
            .map_err(|e| Error::Storage(format!("Failed to acquire lock: {}", e)))?;

        Ok(FileLock { file })
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Get the path to a note's content file. `title` must be sanitized.
    fn note_path(&self, title: &str) -> PathBuf {
        self.root.join(format!("{}.{}", title, NOTE_EXT))
    }

    fn read_index(&self) -> Result<Index, Error> {
        let contents = match fs::read_to_string(self.index_path()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Index::new()),
            Err(e) => return Err(Error::Storage(format!("Failed to read index: {}", e))),
        };

        let document: IndexDocument = serde_json::from_str(&contents)
            .map_err(|e| Error::Storage(format!("Failed to parse index: {}", e)))?;

        Ok(document.into_index())
    }

    fn write_index(&self, index: &Index) -> Result<(), Error> {
        let contents = serde_json::to_string_pretty(index)
            .map_err(|e| Error::Storage(format!("Failed to serialize index: {}", e)))?;
        write_atomic(&self.index_path(), contents.as_bytes())
    }

    /// Titles of every content file in the notes directory.
    fn content_titles(&self) -> Result<HashSet<String>, Error> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| Error::Storage(format!("Failed to read notes dir: {}", e)))?;

        let mut titles = HashSet::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| Error::Storage(format!("Failed to read dir entry: {}", e)))?;
            let path = entry.path();

            if !path.is_file() || path.extension().map(|e| e != NOTE_EXT).unwrap_or(true) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                titles.insert(stem.to_string());
            }
        }

        Ok(titles)
    }

    /// Prune `index` against the content files and persist it.
    /// Returns the number of entries removed. Caller holds the lock.
    fn commit(&self, mut index: Index) -> Result<usize, Error> {
        let titles = self.content_titles()?;
        let before = index.len();

        index.retain(|title, _| {
            let keep = titles.contains(title);
            if !keep {
                tracing::warn!(title = %title, "pruning index entry without content file");
            }
            keep
        });

        self.write_index(&index)?;
        Ok(before - index.len())
    }

    fn sanitized(title: &str) -> Result<String, Error> {
        let title = sanitize_title(title);
        if title.is_empty() {
            return Err(Error::Validation("title cannot be empty".into()));
        }
        Ok(title)
    }

    /// Current local time in index format.
    fn now() -> String {
        format_datetime(Local::now().naive_local())
    }
}

/// Write `contents` to a temp sibling, sync it, and rename it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = File::create(&temp_path)
        .map_err(|e| Error::Storage(format!("Failed to create temp file: {}", e)))?;

    file.write_all(contents)
        .map_err(|e| Error::Storage(format!("Failed to write temp file: {}", e)))?;

    file.sync_all()
        .map_err(|e| Error::Storage(format!("Failed to sync temp file: {}", e)))?;

    fs::rename(&temp_path, path)
        .map_err(|e| Error::Storage(format!("Failed to rename temp file: {}", e)))?;

    Ok(())
}

/// RAII guard for file locking.
struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl NoteStore for FilesStore {
    fn upsert(
        &self,
        title: &str,
        content: &str,
        emotions: Option<Vec<String>>,
    ) -> Result<String, Error> {
        let title = Self::sanitized(title)?;
        let _lock = self.lock()?;

        // Content goes first so the index never points at a file that was
        // never written.
        write_atomic(&self.note_path(&title), content.as_bytes())?;

        let mut index = self.read_index()?;
        let kept = index.remove(&title).map(|m| m.emotions).unwrap_or_default();
        index.insert(
            title.clone(),
            NoteMeta {
                date: Self::now(),
                emotions: emotions.unwrap_or(kept),
            },
        );
        self.commit(index)?;

        tracing::info!(title = %title, "saved note");
        Ok(title)
    }

    fn rename(&self, old_title: &str, new_title: &str) -> Result<String, Error> {
        let old_title = sanitize_title(old_title);
        let new_title = Self::sanitized(new_title)?;
        let _lock = self.lock()?;

        let old_path = self.note_path(&old_title);
        if old_title.is_empty() || !old_path.is_file() {
            return Err(Error::NotFound(format!("note '{}'", old_title)));
        }
        if old_title == new_title {
            return Ok(new_title);
        }

        let new_path = self.note_path(&new_title);
        if new_path.exists() {
            return Err(Error::Conflict(format!(
                "a note titled '{}' already exists",
                new_title
            )));
        }

        fs::rename(&old_path, &new_path)
            .map_err(|e| Error::Storage(format!("Failed to rename note: {}", e)))?;

        let mut index = self.read_index()?;
        if let Some(meta) = index.remove(&old_title) {
            index.insert(new_title.clone(), meta);
        }
        self.commit(index)?;

        tracing::info!(from = %old_title, to = %new_title, "renamed note");
        Ok(new_title)
    }

    fn delete(&self, title: &str) -> Result<(), Error> {
        let title = sanitize_title(title);
        let _lock = self.lock()?;

        match fs::remove_file(self.note_path(&title)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("note '{}'", title)));
            }
            Err(e) => return Err(Error::Storage(format!("Failed to delete note: {}", e))),
        }

        let index = self.read_index()?;
        self.commit(index)?;

        tracing::info!(title = %title, "deleted note");
        Ok(())
    }

    fn list(&self) -> Result<BTreeMap<String, NoteMeta>, Error> {
        let mut index = self.read_index()?;
        let titles = self.content_titles()?;

        // Files removed behind our back are hidden until the next prune.
        index.retain(|title, _| titles.contains(title));
        Ok(index)
    }

    fn get_info(&self, title: &str) -> Result<NoteInfo, Error> {
        let title = sanitize_title(title);
        let index = self.read_index()?;

        let meta = index
            .get(&title)
            .ok_or_else(|| Error::NotFound(format!("note '{}'", title)))?;

        let path = self.note_path(&title);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(title = %title, "index entry has no content file");
                return Err(Error::NotFound(format!(
                    "content file {} for note '{}'",
                    path.display(),
                    title
                )));
            }
            Err(e) => return Err(Error::Storage(format!("Failed to read note: {}", e))),
        };

        Ok(NoteInfo {
            title,
            content,
            date: meta.date.clone(),
            emotions: meta.emotions.clone(),
        })
    }

    fn prune(&self) -> Result<usize, Error> {
        let _lock = self.lock()?;
        let index = self.read_index()?;
        self.commit(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodlog_core::DATE_FORMAT;
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FilesStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesStore::open(temp_dir.path().join("UserNotes")).unwrap();
        (temp_dir, store)
    }

    fn raw_index(store: &FilesStore) -> serde_json::Value {
        let contents = fs::read_to_string(store.root().join(INDEX_FILE)).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    #[test]
    fn test_open_creates_dir_and_empty_index() {
        let (_temp, store) = setup();
        assert!(store.root().is_dir());
        assert_eq!(raw_index(&store), serde_json::json!({}));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_and_get_info() {
        let (_temp, store) = setup();
        let before = Local::now().format(DATE_FORMAT).to_string();

        let title = store
            .upsert("Monday", "Felt great today.\nLong walk.", None)
            .unwrap();
        assert_eq!(title, "Monday");

        let info = store.get_info("Monday").unwrap();
        assert_eq!(info.content, "Felt great today.\nLong walk.");
        assert!(info.date >= before);
        assert!(info.emotions.is_empty());
        assert!(store.root().join("Monday.txt").is_file());
    }

    #[test]
    fn test_upsert_sanitizes_title() {
        let (_temp, store) = setup();

        let title = store.upsert("what/now: a*b?", "x", None).unwrap();
        assert_eq!(title, "what_now_ a_b_");

        let index = store.list().unwrap();
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["what_now_ a_b_"]);
        assert!(store.root().join("what_now_ a_b_.txt").is_file());
        assert_eq!(store.get_info("what/now: a*b?").unwrap().content, "x");
    }

    #[test]
    fn test_upsert_empty_title_rejected() {
        let (_temp, store) = setup();
        assert!(matches!(store.upsert("  ", "x", None), Err(Error::Validation(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_emotion_update_flag() {
        let (_temp, store) = setup();

        store
            .upsert("day", "first", Some(vec!["joy".to_string()]))
            .unwrap();
        store.upsert("day", "second", None).unwrap();

        let info = store.get_info("day").unwrap();
        assert_eq!(info.content, "second");
        assert_eq!(info.emotions, vec!["joy"]);

        store.upsert("day", "third", Some(vec![])).unwrap();
        assert!(store.get_info("day").unwrap().emotions.is_empty());
    }

    #[test]
    fn test_index_json_shape() {
        let (_temp, store) = setup();
        store
            .upsert("day", "text", Some(vec!["fear".to_string()]))
            .unwrap();

        let index = raw_index(&store);
        assert_eq!(index["day"]["emotion"], serde_json::json!(["fear"]));
        let date = index["day"]["date"].as_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(date, DATE_FORMAT).is_ok());
    }

    #[test]
    fn test_rename() {
        let (_temp, store) = setup();
        store
            .upsert("old", "kept content", Some(vec!["love".to_string()]))
            .unwrap();

        let new_title = store.rename("old", "new:name").unwrap();
        assert_eq!(new_title, "new_name");

        let info = store.get_info("new_name").unwrap();
        assert_eq!(info.content, "kept content");
        assert_eq!(info.emotions, vec!["love"]);
        assert!(matches!(store.get_info("old"), Err(Error::NotFound(_))));
        assert!(!store.root().join("old.txt").exists());
    }

    #[test]
    fn test_rename_missing_note() {
        let (_temp, store) = setup();
        assert!(matches!(store.rename("ghost", "other"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_rename_onto_existing_note() {
        let (_temp, store) = setup();
        store.upsert("a", "A", None).unwrap();
        store.upsert("b", "B", None).unwrap();

        assert!(matches!(store.rename("a", "b"), Err(Error::Conflict(_))));
        assert_eq!(store.get_info("b").unwrap().content, "B");
        assert_eq!(store.get_info("a").unwrap().content, "A");
    }

    #[test]
    fn test_rename_to_same_title() {
        let (_temp, store) = setup();
        store.upsert("same", "x", None).unwrap();
        assert_eq!(store.rename("same", " same ").unwrap(), "same");
        assert_eq!(store.get_info("same").unwrap().content, "x");
    }

    #[test]
    fn test_delete() {
        let (_temp, store) = setup();
        store.upsert("gone", "bye", None).unwrap();
        store.upsert("stays", "hi", None).unwrap();

        store.delete("gone").unwrap();

        let index = store.list().unwrap();
        assert!(!index.contains_key("gone"));
        assert!(index.contains_key("stays"));
        assert!(raw_index(&store).get("gone").is_none());
        assert!(matches!(store.delete("gone"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_prune_on_open_and_no_readoption() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("notes");

        {
            let store = FilesStore::open(&root).unwrap();
            store.upsert("kept", "k", None).unwrap();
            store.upsert("lost", "l", None).unwrap();
        }

        fs::remove_file(root.join("lost.txt")).unwrap();
        fs::write(root.join("orphan.txt"), "no index entry").unwrap();

        let store = FilesStore::open(&root).unwrap();
        let index = store.list().unwrap();
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["kept"]);
        assert!(raw_index(&store).get("lost").is_none());
        assert!(matches!(store.get_info("orphan"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_hides_externally_deleted_files() {
        let (_temp, store) = setup();
        store.upsert("a", "A", None).unwrap();
        store.upsert("b", "B", None).unwrap();
        fs::remove_file(store.root().join("a.txt")).unwrap();

        let index = store.list().unwrap();
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["b"]);

        assert_eq!(store.prune().unwrap(), 1);
        assert!(raw_index(&store).get("a").is_none());
    }

    #[test]
    fn test_get_info_with_missing_content_file() {
        let (_temp, store) = setup();
        store.upsert("a", "A", None).unwrap();
        fs::remove_file(store.root().join("a.txt")).unwrap();

        match store.get_info("a") {
            Err(Error::NotFound(msg)) => assert!(msg.contains("content file")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_list_index_is_converted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("notes");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("first.txt"), "one").unwrap();
        fs::write(root.join("second.txt"), "two").unwrap();
        fs::write(
            root.join(INDEX_FILE),
            r#"[
                {"title": "first.txt", "date": "2024-07-21 16:00:00", "emotion": "joy"},
                {"title": "second.txt", "date": "2024-07-22 09:00:00", "emotion": ""},
                {"title": "third.txt", "date": "2024-07-23 09:00:00", "emotion": ["fear"]}
            ]"#,
        )
        .unwrap();

        let store = FilesStore::open(&root).unwrap();
        let first = store.get_info("first").unwrap();
        assert_eq!(first.date, "2024-07-21 16:00:00");
        assert_eq!(first.emotions, vec!["joy"]);
        assert!(store.get_info("second").unwrap().emotions.is_empty());
        assert!(store.list().unwrap().get("third").is_none());
        assert!(raw_index(&store).is_object());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (_temp, store) = setup();
        store.upsert("a", "A", None).unwrap();

        let leftovers: Vec<_> = fs::read_dir(store.root())
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_upserts() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("notes");
        FilesStore::open(&root).unwrap();

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let root = root.clone();
                thread::spawn(move || {
                    let store = FilesStore::open(&root).unwrap();
                    store
                        .upsert(&format!("Note {}", i), &format!("Body {}", i), None)
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let store = FilesStore::open(&root).unwrap();
        assert_eq!(store.list().unwrap().len(), 10);
    }
}
