//! Media storage backends
//!
//! Every file-system side effect of the catalog goes through [`Storage`].
//! Paths are relative to the media root and always use `/` as separator.
//! Implementations are blocking; async callers run them on the blocking pool.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

pub trait Storage: Send + Sync + fmt::Debug {
    fn exists(&self, path: &str) -> io::Result<bool>;

    /// Writes the whole reader to `path`, creating parent directories and
    /// replacing any existing file. Returns the number of bytes written.
    fn write(&self, path: &str, reader: &mut dyn Read) -> io::Result<u64>;

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

    /// Moves a file, creating the destination's parent directories
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    fn remove_file(&self, path: &str) -> io::Result<()>;

    /// Removes a directory only when it exists and is empty.
    /// Returns whether it was removed.
    fn remove_dir_if_empty(&self, path: &str) -> io::Result<bool>;
}

fn invalid_path(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("'{}' is not a relative media path", path),
    )
}

/// Storage rooted at a directory on the local file system
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        let only_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !only_normal {
            return Err(invalid_path(path));
        }
        Ok(self.root.join(relative))
    }

    fn ensure_parent(target: &Path) -> io::Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.resolve(path)?.exists())
    }

    fn write(&self, path: &str, reader: &mut dyn Read) -> io::Result<u64> {
        let target = self.resolve(path)?;
        Self::ensure_parent(&target)?;
        let dir = target.parent().unwrap_or(&self.root);

        let mut temp = NamedTempFile::new_in(dir)?;
        let written = io::copy(reader, &mut temp)?;
        temp.flush()?;
        temp.persist(&target).map_err(|e| e.error)?;
        Ok(written)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = fs::File::open(self.resolve(path)?)?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        Self::ensure_parent(&target)?;

        match fs::rename(&source, &target) {
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                fs::copy(&source, &target)?;
                fs::remove_file(&source)
            }
            other => other,
        }
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path)?)
    }

    fn remove_dir_if_empty(&self, path: &str) -> io::Result<bool> {
        let dir = self.resolve(path)?;
        if !dir.is_dir() {
            return Ok(false);
        }
        if fs::read_dir(&dir)?.next().is_some() {
            return Ok(false);
        }
        fs::remove_dir(&dir)?;
        Ok(true)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    failing_moves: Vec<String>,
    failing_dirs: Vec<String>,
}

impl MemoryState {
    fn add_parents(&mut self, path: &str) {
        let mut current = path;
        while let Some((parent, _)) = current.rsplit_once('/') {
            self.dirs.insert(parent.to_string());
            current = parent;
        }
    }

    fn has_children(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir);
        self.files.keys().any(|p| p.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }
}

/// In-memory storage with fault injection, used by tests and dry runs.
///
/// Directories are tracked explicitly so pruning behaves like a real file
/// system: writing a file creates its ancestors, and an emptied directory
/// stays until removed.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> io::Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| io::Error::other("memory storage lock poisoned"))
    }

    /// Makes every move whose source path contains `pattern` fail
    pub fn fail_moves_matching(&self, pattern: impl Into<String>) -> io::Result<()> {
        self.state()?.failing_moves.push(pattern.into());
        Ok(())
    }

    /// Makes removing the given directory fail
    pub fn fail_dir_removal(&self, dir: impl Into<String>) -> io::Result<()> {
        self.state()?.failing_dirs.push(dir.into());
        Ok(())
    }

    pub fn clear_faults(&self) -> io::Result<()> {
        let mut state = self.state()?;
        state.failing_moves.clear();
        state.failing_dirs.clear();
        Ok(())
    }

    /// All stored file paths in sorted order
    pub fn files(&self) -> io::Result<Vec<String>> {
        Ok(self.state()?.files.keys().cloned().collect())
    }

    pub fn dir_exists(&self, dir: &str) -> io::Result<bool> {
        Ok(self.state()?.dirs.contains(dir))
    }

    pub fn read_to_vec(&self, path: &str) -> io::Result<Vec<u8>> {
        self.state()?
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, path: &str) -> io::Result<bool> {
        let state = self.state()?;
        Ok(state.files.contains_key(path) || state.dirs.contains(path))
    }

    fn write(&self, path: &str, reader: &mut dyn Read) -> io::Result<u64> {
        if path.is_empty() || path.starts_with('/') {
            return Err(invalid_path(path));
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let written = data.len() as u64;

        let mut state = self.state()?;
        state.add_parents(path);
        state.files.insert(path.to_string(), data);
        Ok(written)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let data = self.read_to_vec(path)?;
        Ok(Box::new(io::Cursor::new(data)))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut state = self.state()?;
        if state.failing_moves.iter().any(|p| from.contains(p.as_str())) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected move failure for {}", from),
            ));
        }

        let data = state
            .files
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.to_string()))?;
        state.add_parents(to);
        state.files.insert(to.to_string(), data);
        Ok(())
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        self.state()?
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn remove_dir_if_empty(&self, path: &str) -> io::Result<bool> {
        let mut state = self.state()?;
        if !state.dirs.contains(path) || state.has_children(path) {
            return Ok(false);
        }
        if state.failing_dirs.iter().any(|d| d == path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected removal failure for {}", path),
            ));
        }
        state.dirs.remove(path);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_str(storage: &dyn Storage, path: &str, content: &str) {
        storage
            .write(path, &mut content.as_bytes())
            .expect("write should succeed");
    }

    fn read_str(storage: &dyn Storage, path: &str) -> String {
        let mut out = String::new();
        storage
            .open(path)
            .expect("open should succeed")
            .read_to_string(&mut out)
            .expect("read should succeed");
        out
    }

    fn exercise_backend(storage: &dyn Storage) {
        write_str(storage, "audio/a/s/b/track.mp3", "data");
        assert!(storage.exists("audio/a/s/b/track.mp3").unwrap());
        assert!(storage.exists("audio/a/s/b").unwrap());

        storage
            .rename("audio/a/s/b/track.mp3", "audio/x/y/z/track.mp3")
            .unwrap();
        assert!(!storage.exists("audio/a/s/b/track.mp3").unwrap());
        assert_eq!(read_str(storage, "audio/x/y/z/track.mp3"), "data");

        assert!(storage.remove_dir_if_empty("audio/a/s/b").unwrap());
        assert!(storage.remove_dir_if_empty("audio/a/s").unwrap());
        assert!(storage.remove_dir_if_empty("audio/a").unwrap());
        assert!(!storage.exists("audio/a").unwrap());

        assert!(!storage.remove_dir_if_empty("audio/x/y").unwrap());
        assert!(!storage.remove_dir_if_empty("audio/missing").unwrap());

        storage.remove_file("audio/x/y/z/track.mp3").unwrap();
        assert!(storage.remove_file("audio/x/y/z/track.mp3").is_err());
    }

    #[test]
    fn test_local_storage_operations() {
        let dir = TempDir::new().unwrap();
        exercise_backend(&LocalStorage::new(dir.path()));
    }

    #[test]
    fn test_memory_storage_operations() {
        exercise_backend(&MemoryStorage::new());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        write_str(&storage, "books/dune.jpg", "old");
        write_str(&storage, "books/dune.jpg", "new");
        assert_eq!(read_str(&storage, "books/dune.jpg"), "new");
    }

    #[test]
    fn test_local_storage_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(storage.write("../outside.mp3", &mut "x".as_bytes()).is_err());
        assert!(storage.exists("/etc/passwd").is_err());
        assert!(storage.open("audio/../../x").is_err());
    }

    #[test]
    fn test_memory_storage_move_fault() {
        let storage = MemoryStorage::new();
        write_str(&storage, "audio/a/s/b/01.mp3", "1");
        storage.fail_moves_matching("01.mp3").unwrap();

        let err = storage
            .rename("audio/a/s/b/01.mp3", "audio/c/s/b/01.mp3")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(storage.files().unwrap(), vec!["audio/a/s/b/01.mp3"]);

        storage.clear_faults().unwrap();
        storage
            .rename("audio/a/s/b/01.mp3", "audio/c/s/b/01.mp3")
            .unwrap();
    }

    #[test]
    fn test_memory_storage_dir_fault() {
        let storage = MemoryStorage::new();
        write_str(&storage, "audio/a/s/b/01.mp3", "1");
        storage.remove_file("audio/a/s/b/01.mp3").unwrap();
        storage.fail_dir_removal("audio/a/s/b").unwrap();

        assert!(storage.remove_dir_if_empty("audio/a/s/b").is_err());
        assert!(storage.dir_exists("audio/a/s/b").unwrap());
    }
}
