use super::KeyLock;
use crate::Result;
use ohno::IntoAppError;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use core::sync::atomic::{AtomicU64, Ordering};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     store";

const ENTRY_EXT: &str = ".json";
const LOCK_EXT: &str = ".lock";

/// Everything except ASCII alphanumerics, `-` and `_` is escaped, so keys can hold
/// slashes and dots without escaping the store directory or colliding.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Result of reading one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<T> {
    Found(T),
    Missing,

    /// The file exists but could not be decoded.
    Corrupt(String),
}

impl<T> Entry<T> {
    /// The value if found, treating corrupt entries as missing.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing | Self::Corrupt(_) => None,
        }
    }
}

/// A directory of JSON documents addressed by arbitrary string keys.
///
/// Writes go to a temporary file in the same directory which is then renamed over
/// the target, so readers see either the previous document or the new one.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A separate store living in a subdirectory of this one.
    #[must_use]
    pub fn namespace(&self, name: &str) -> Self {
        Self::new(self.dir.join(encode_key(name)))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Entry<T>> {
        let path = self.entry_path(key);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entry::Missing),
            Err(e) => return Err(e).into_app_err_with(|| format!("opening '{}'", path.display())),
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(value) => Ok(Entry::Found(value)),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Could not decode '{}': {e:#}", path.display());
                Ok(Entry::Corrupt(e.to_string()))
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("creating directory '{}'", self.dir.display()))?;

        let path = self.entry_path(key);
        let temp = self.dir.join(format!(
            ".{}.{}-{}.tmp",
            encode_key(key),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let result = write_json(&temp, value).and_then(|()| {
            fs::rename(&temp, &path).into_app_err_with(|| format!("moving '{}' into place", path.display()))
        });

        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }

        result
    }

    /// Remove a key. Returns whether anything was removed.
    ///
    /// The key's lock file is left in place so that a concurrent holder keeps
    /// excluding others.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).into_app_err_with(|| format!("removing '{}'", path.display())),
        }
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).into_app_err_with(|| format!("listing '{}'", self.dir.display())),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.into_app_err_with(|| format!("listing '{}'", self.dir.display()))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if name.starts_with('.') {
                continue;
            }

            if let Some(encoded) = name.strip_suffix(ENTRY_EXT)
                && let Ok(key) = percent_decode_str(encoded).decode_utf8()
            {
                keys.push(key.into_owned());
            }
        }

        keys.sort_unstable();
        Ok(keys)
    }

    /// Remove every key. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys()? {
            if self.delete(&key)? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Take the exclusive writer lock for `key`, blocking until it is free.
    pub fn lock(&self, key: &str) -> Result<KeyLock> {
        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("creating directory '{}'", self.dir.display()))?;
        KeyLock::acquire(&self.lock_path(key))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{ENTRY_EXT}", encode_key(key)))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{LOCK_EXT}", encode_key(key)))
    }
}

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).into_app_err_with(|| format!("creating '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    #[cfg(debug_assertions)]
    let result = serde_json::to_writer_pretty(&mut writer, value);
    #[cfg(not(debug_assertions))]
    let result = serde_json::to_writer(&mut writer, value);

    result.into_app_err_with(|| format!("writing '{}'", path.display()))?;
    writer.flush().into_app_err_with(|| format!("flushing '{}'", path.display()))?;
    writer
        .get_ref()
        .sync_all()
        .into_app_err_with(|| format!("syncing '{}'", path.display()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn doc(name: &str, count: u32) -> Doc {
        Doc {
            name: name.to_string(),
            count,
        }
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn set_then_get() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path());

        store.set("alpha", &doc("alpha", 1)).unwrap();
        assert_eq!(store.get::<Doc>("alpha").unwrap(), Entry::Found(doc("alpha", 1)));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn missing_key() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path().join("not-yet-created"));

        assert_eq!(store.get::<Doc>("nope").unwrap(), Entry::Missing);
        assert!(store.keys().unwrap().is_empty());
        assert!(!store.delete("nope").unwrap());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn overwrite_replaces_previous_value() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path());

        store.set("k", &doc("first", 1)).unwrap();
        store.set("k", &doc("second", 2)).unwrap();

        assert_eq!(store.get::<Doc>("k").unwrap(), Entry::Found(doc("second", 2)));
        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn path_like_keys_round_trip_without_collisions() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path());

        let keys = ["modules/a_b.js", "modules_a/b.js", "../escape", "spaced key", "ünïcode"];
        for (i, key) in keys.iter().enumerate() {
            store.set(key, &doc(key, u32::try_from(i).unwrap())).unwrap();
        }

        let mut expected: Vec<String> = keys.iter().map(ToString::to_string).collect();
        expected.sort_unstable();
        assert_eq!(store.keys().unwrap(), expected);

        for (i, key) in keys.iter().enumerate() {
            assert_eq!(store.get::<Doc>(key).unwrap(), Entry::Found(doc(key, u32::try_from(i).unwrap())));
        }

        // nothing escaped the store directory
        assert!(!tmp.path().parent().unwrap().join("escape.json").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn corrupt_file_is_reported_not_raised() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path());

        fs::write(tmp.path().join("broken.json"), "{ \"name\": ").unwrap();
        assert!(matches!(store.get::<Doc>("broken").unwrap(), Entry::Corrupt(_)));
        assert!(store.get::<Doc>("broken").unwrap().found().is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn keys_skip_temp_and_lock_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path());

        store.set("real", &doc("real", 1)).unwrap();
        let _lock = store.lock("real").unwrap();
        fs::write(tmp.path().join(".real.999.tmp"), "partial").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["real".to_string()]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn delete_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonStore::new(tmp.path());

        for key in ["a", "b", "c"] {
            store.set(key, &doc(key, 0)).unwrap();
        }

        assert!(store.delete("b").unwrap());
        assert!(!store.delete("b").unwrap());
        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn namespaces_are_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let root = JsonStore::new(tmp.path());
        let left = root.namespace("prebid/Prebid.js");
        let right = root.namespace("prebid/prebid-server");

        left.set("k", &doc("left", 1)).unwrap();
        assert_eq!(right.get::<Doc>("k").unwrap(), Entry::Missing);
        assert!(left.dir().starts_with(tmp.path()));
    }
}
