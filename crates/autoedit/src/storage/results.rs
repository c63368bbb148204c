use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::pipeline::{ResultRecord, WorkflowStepResult};

pub const RESULTS_FILE: &str = "results.json";
pub const IMAGES_DIR: &str = "images";

/// Index entry for a persisted result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_prompt: String,
    pub caption: String,
    pub refined_prompt: String,
    pub image_filename: Option<String>,
    pub image_format: Option<String>,
    pub steps: Vec<WorkflowStepResult>,
}

/// Where the workflow hands finished results.
pub trait ResultSink: Send + Sync {
    fn save(&self, record: &ResultRecord) -> Result<StoredResult, StorageError>;
}

/// Results on disk: `<root>/results.json` (newest first) plus image files
/// under `<root>/images/`.
pub struct ResultStore {
    root: PathBuf,
    images_dir: PathBuf,
    index_path: PathBuf,
    // Serializes read-modify-write of the index.
    write_lock: Mutex<()>,
}

impl ResultStore {
    /// Opens the store, creating its directories if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        let images_dir = root.join(IMAGES_DIR);
        std::fs::create_dir_all(&images_dir).map_err(|e| StorageError::CreateDirectory {
            path: images_dir.clone(),
            source: e,
        })?;

        Ok(Self {
            index_path: root.join(RESULTS_FILE),
            images_dir,
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// All stored results, newest first. A missing, unreadable or corrupt
    /// index is treated as empty.
    pub fn list(&self) -> Vec<StoredResult> {
        self.read_index().unwrap_or_else(|e| {
            warn!("{}", e);
            Vec::new()
        })
    }

    /// Missing or corrupt index reads as empty; any other I/O failure is an
    /// error so a save never overwrites history it could not read.
    fn read_index(&self) -> Result<Vec<StoredResult>, StorageError> {
        let content = match std::fs::read(&self.index_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ReadFile {
                    path: self.index_path.clone(),
                    source: e,
                })
            }
        };

        match serde_json::from_slice(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.index_path.display(), "Corrupt result index, treating as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<StoredResult> {
        self.list().into_iter().find(|r| r.id == id)
    }

    pub fn recent(&self, limit: usize) -> Vec<StoredResult> {
        let mut entries = self.list();
        entries.truncate(limit);
        entries
    }

    /// Case-insensitive match on the user prompt.
    pub fn search(&self, keyword: &str) -> Vec<StoredResult> {
        let needle = keyword.to_lowercase();
        self.list()
            .into_iter()
            .filter(|r| r.user_prompt.to_lowercase().contains(&needle))
            .collect()
    }

    /// Path of a stored image. Only the final path component of
    /// `image_filename` is used.
    pub fn image_path(&self, image_filename: &str) -> Option<PathBuf> {
        Path::new(image_filename)
            .file_name()
            .map(|name| self.images_dir.join(name))
    }

    pub fn load_image(&self, stored: &StoredResult) -> Result<Vec<u8>, StorageError> {
        let path = stored
            .image_filename
            .as_deref()
            .and_then(|f| self.image_path(f))
            .ok_or_else(|| StorageError::MissingImage(stored.id.clone()))?;
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Creates `<id>.<ext>` exclusively. `Ok(None)` means the name is taken.
    fn create_image(
        &self,
        id: &str,
        extension: &str,
        content: &[u8],
    ) -> Result<Option<String>, StorageError> {
        let filename = format!("{}.{}", id, extension);
        let path = self.images_dir.join(&filename);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content)
                    .map_err(|e| StorageError::WriteFile {
                        path: path.clone(),
                        source: e,
                    })?;
                Ok(Some(filename))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(StorageError::WriteFile { path, source: e }),
        }
    }

    /// Rewrites the index through a temp file so readers never see a partial file.
    fn write_index(&self, entries: &[StoredResult]) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.root.join(format!("{}.tmp", RESULTS_FILE));

        std::fs::write(&tmp_path, &content).map_err(|e| StorageError::WriteFile {
            path: tmp_path.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp_path, &self.index_path).map_err(|e| StorageError::WriteFile {
            path: self.index_path.clone(),
            source: e,
        })
    }
}

impl ResultSink for ResultStore {
    fn save(&self, record: &ResultRecord) -> Result<StoredResult, StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut entries = self.read_index()?;
        let base_id = format!(
            "result_{}",
            record.created_at().format("%Y%m%d_%H%M%S_%6f")
        );

        let mut claimed = None;
        for counter in 1..=1000 {
            let id = if counter == 1 {
                base_id.clone()
            } else {
                format!("{}_{}", base_id, counter)
            };
            if entries.iter().any(|e| e.id == id) {
                continue;
            }
            match record.final_image() {
                Some(image) => {
                    if let Some(filename) =
                        self.create_image(&id, &image.extension(), image.bytes())?
                    {
                        claimed = Some((id, Some(filename)));
                        break;
                    }
                }
                None => {
                    claimed = Some((id, None));
                    break;
                }
            }
        }
        let (id, image_filename) =
            claimed.ok_or_else(|| StorageError::FileExists(self.images_dir.join(&base_id)))?;

        let stored = StoredResult {
            id,
            timestamp: record.created_at(),
            user_prompt: record.user_prompt().to_string(),
            caption: record.caption().to_string(),
            refined_prompt: record.refined_prompt().to_string(),
            image_format: image_filename
                .as_ref()
                .and(record.final_image_format().map(str::to_string)),
            image_filename,
            steps: record.steps().to_vec(),
        };

        entries.insert(0, stored.clone());
        if let Err(e) = self.write_index(&entries) {
            if let Some(path) = stored.image_filename.as_deref().and_then(|f| self.image_path(f)) {
                let _ = std::fs::remove_file(path);
            }
            return Err(e);
        }

        debug!(id = %stored.id, "Stored result");
        Ok(stored)
    }
}
