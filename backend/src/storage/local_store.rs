use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";
const OBJECTS_DIR: &str = "objects";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index error: {0}")]
    Index(#[from] serde_json::Error),
    #[error("File too large")]
    FileTooLarge,
    #[error("Invalid filename")]
    InvalidFilename,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Name the client uploaded the file under, directory parts stripped.
    pub filename: String,
    pub key: String,
}

impl StoredImage {
    pub fn url(&self) -> String {
        format!("/uploads/{}", self.filename)
    }
}

/// Uploaded images on local disk.
///
/// Objects are content-addressed (`objects/<sha256>.<ext>`) so client
/// filenames never become filesystem paths; `index.json` maps each public
/// filename to the object most recently uploaded under it.
pub struct LocalStore {
    objects_dir: PathBuf,
    index_path: PathBuf,
    max_bytes: usize,
    index: Mutex<HashMap<String, IndexEntry>>,
}

impl LocalStore {
    pub fn open(root: impl AsRef<Path>, max_bytes: usize) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let objects_dir = root.join(OBJECTS_DIR);
        std::fs::create_dir_all(&objects_dir)?;

        let index_path = root.join(INDEX_FILE);
        let index: HashMap<String, IndexEntry> = match std::fs::read(&index_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(
            "Upload store at {} ({} indexed files)",
            root.display(),
            index.len()
        );

        Ok(Self {
            objects_dir,
            index_path,
            max_bytes,
            index: Mutex::new(index),
        })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    /// Final path component of a client-supplied filename.
    pub fn public_name(raw: &str) -> Result<String, StoreError> {
        let name = raw
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default();
        if name.is_empty() || name == "." || name == ".." {
            return Err(StoreError::InvalidFilename);
        }
        Ok(name.to_string())
    }

    pub fn extract_file_extension(filename: &str) -> Option<String> {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
    }

    pub fn generate_key(image_hash: &str, file_extension: Option<&str>) -> String {
        match file_extension {
            Some(ext) => format!("{}.{}", image_hash, ext),
            None => image_hash.to_string(),
        }
    }

    pub fn validate_image_size(&self, image_data: &[u8]) -> Result<(), StoreError> {
        if image_data.len() > self.max_bytes {
            return Err(StoreError::FileTooLarge);
        }
        Ok(())
    }

    pub async fn save(&self, filename: &str, image_data: &[u8]) -> Result<StoredImage, StoreError> {
        self.validate_image_size(image_data)?;
        let filename = Self::public_name(filename)?;

        let image_hash = Self::calculate_image_hash(image_data);
        let extension = Self::extract_file_extension(&filename);
        let key = Self::generate_key(&image_hash, extension.as_deref());
        let path = self.objects_dir.join(&key);

        if tokio::fs::try_exists(&path).await? {
            debug!("Object {} already stored, reusing it", key);
        } else {
            write_atomic(&path, image_data).await?;
        }

        let mut index = self.index.lock().await;
        let mut updated = index.clone();
        updated.insert(
            filename.clone(),
            IndexEntry {
                key: key.clone(),
                size: image_data.len() as u64,
                uploaded_at: Utc::now(),
            },
        );
        // The in-memory index only changes once the new one is on disk.
        let serialized = serde_json::to_vec_pretty(&updated)?;
        write_atomic(&self.index_path, &serialized).await?;
        *index = updated;
        drop(index);

        info!("Stored upload {} as {}", filename, key);
        Ok(StoredImage { filename, key })
    }

    /// Object path of the latest upload stored under `filename`.
    pub async fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let key = self.index.lock().await.get(filename)?.key.clone();
        let path = self.objects_dir.join(key);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => None,
        }
    }
}

/// Writes through a uniquely named temp file and renames it into place, so
/// concurrent readers see either the old or the new content.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("object");
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
