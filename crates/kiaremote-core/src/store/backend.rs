use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;

/// Where the encrypted store blob lives.
///
/// Backends move opaque text; encryption and serialization happen above them.
pub trait StoreBackend: Send + Sync {
    /// Current contents, `None` if nothing has been written yet
    fn read(&self) -> Result<Option<String>>;

    /// Replace the contents entirely
    fn write(&self, contents: &str) -> Result<()>;
}

/// Single file on disk, replaced atomically on every write.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

impl StoreBackend for FileBackend {
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let temp = self.temp_path();
        std::fs::write(&temp, contents)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// In-process backing, for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryBackend {
    contents: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(contents.into())),
        }
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>> {
        let guard = self.contents.lock().unwrap_or_else(|p| p.into_inner());
        Ok(guard.clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        let mut guard = self.contents.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(contents.to_string());
        Ok(())
    }
}
