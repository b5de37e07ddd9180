use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::isolation::{contained_join, SessionRoot};

/// Reads and writes for one session. Every path is resolved through the
/// session root, so nothing here can touch another session's tree.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: SessionRoot,
}

impl FileStorage {
    pub fn new(root: SessionRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &SessionRoot {
        &self.root
    }

    /// Stores an uploaded file under `uploads/<batch_id>/`. A name already
    /// taken in the batch gets a numbered variant (`scan_2.pdf`).
    pub fn store_upload(
        &self,
        batch_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir_path = self.root.uploads_dir(batch_id)?;
        contained_join(&dir_path, Path::new(name))?;
        ensure_directory(&dir_path)?;

        store_with_atomic_creation(&dir_path, name, content)
    }

    /// Writes an artifact under `outputs/<batch_id>/`, replacing any
    /// previous file of the same name.
    pub fn write_output(
        &self,
        batch_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir_path = self.root.outputs_dir(batch_id)?;
        let path = contained_join(&dir_path, Path::new(name))?;
        ensure_directory(&dir_path)?;

        replace_atomically(&path, content)?;
        Ok(path)
    }

    pub fn write_summary(&self, content: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.root.summary_path();
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }

        replace_atomically(&path, content)?;
        Ok(path)
    }

    /// `None` when no summary has been written for this session.
    pub fn read_summary(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.root.summary_path();
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFile { path, source: e }),
        }
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Creates `filename` in `dir_path` with O_EXCL, falling back to numbered
/// variants when the name is taken.
fn store_with_atomic_creation(
    dir_path: &Path,
    filename: &str,
    content: &[u8],
) -> Result<PathBuf, StorageError> {
    let (base, ext) = match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    };

    for counter in 1..=1000 {
        let try_filename = if counter == 1 {
            filename.to_string()
        } else {
            match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            }
        };

        let try_path = dir_path.join(&try_filename);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&try_path)
        {
            Ok(mut file) => {
                file.write_all(content)
                    .map_err(|e| StorageError::WriteFile {
                        path: try_path.clone(),
                        source: e,
                    })?;
                return Ok(try_path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(StorageError::WriteFile {
                    path: try_path,
                    source: e,
                });
            }
        }
    }

    Err(StorageError::FileExists(dir_path.join(filename)))
}

/// Write to a sibling temp file, then rename over the target. Readers see
/// either the old content or the new, never a torn write.
fn replace_atomically(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ));

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()
    };

    if let Err(e) = write() {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StorageError::MoveFile {
            from: temp_path.clone(),
            to: path.to_path_buf(),
            source: e,
        }
    })
}
