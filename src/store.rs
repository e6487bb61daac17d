//! Persisted front-end configuration.
//!
//! The blob is opaque JSON, read and written whole. Reads never fail: a
//! missing or unreadable file is treated as `{}`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::StoreError;

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current blob, or `{}` if there is none or it cannot be read.
    pub async fn load(&self) -> Value {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return json!({}),
            Err(e) => {
                error!("Failed to read config {}: {e}", self.path.display());
                return json!({});
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            error!("Failed to parse config {}: {e}", self.path.display());
            json!({})
        })
    }

    /// Replace the blob with `value`.
    pub async fn save(&self, value: &Value) -> Result<(), StoreError> {
        let bytes = to_pretty_json(value)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, bytes).await?;
        info!("Config saved.");
        Ok(())
    }
}

/// Four-space indented JSON. Non-ASCII text is written as-is.
fn to_pretty_json(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(out)
}
