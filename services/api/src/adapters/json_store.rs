//! services/api/src/adapters/json_store.rs
//!
//! The persistence adapter: a `KeyValueStore` kept as one JSON object on disk.
//!
//! The whole document is cached in memory and rewritten on every change. Writes go to
//! a temporary sibling file that is then renamed over the original, so a crash never
//! leaves a half-written store behind.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use study_cards_core::ports::{KeyValueStore, PortError, PortResult};
use tokio::sync::Mutex;
use tracing::{debug, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct JsonFileStore {
    path: PathBuf,
    document: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating parent directories as needed. A missing file
    /// is treated as an empty store.
    pub async fn open(path: impl AsRef<Path>) -> PortResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("create storage directory", &path, e))?;
        }

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(PortError::Storage(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )))
                }
                Err(e) => {
                    return Err(PortError::Storage(format!(
                        "{} is not valid JSON: {}",
                        path.display(),
                        e
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(storage_error("read", &path, e)),
        };

        info!("Opened storage at {} ({} keys)", path.display(), document.len());
        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_out(&self, document: &Map<String, Value>) -> PortResult<()> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| PortError::Storage(format!("serialize store: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| storage_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error("replace", &self.path, e))?;

        debug!("Persisted {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> PortError {
    PortError::Storage(format!("failed to {} {}: {}", action, path.display(), e))
}

//=========================================================================================
// `KeyValueStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> PortResult<Option<Value>> {
        Ok(self.document.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> PortResult<()> {
        let mut document = self.document.lock().await;
        let previous = document.insert(key.to_string(), value);
        if let Err(e) = self.write_out(&document).await {
            // Keep memory in step with disk.
            match previous {
                Some(old) => document.insert(key.to_string(), old),
                None => document.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        let mut document = self.document.lock().await;
        let Some(previous) = document.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.write_out(&document).await {
            document.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}
