//! Per-step checkpoint records
//!
//! One JSON file per step under `<output>/.toolforge/checkpoints/`. A record is only reused
//! when it parses, names the right step and format version, its payload digest matches and it
//! was produced from the same inputs. Anything else is reported as a miss and the step runs
//! fresh; a corrupt record is never partially recovered.

use super::Step;
use crate::module::Module;
use crate::util::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;
pub const STATE_DIR: &str = ".toolforge";
const CHECKPOINT_DIR: &str = "checkpoints";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to serialize checkpoint for step '{step}': {source}")]
    Serialize {
        step: Step,
        source: serde_json::Error,
    },

    #[error("Failed to write checkpoint {}: {source:#}", path.display())]
    Write { path: PathBuf, source: anyhow::Error },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub step: String,
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub inputs_digest: String,
    pub payload_digest: String,
    pub payload: Value,
}

/// Why a stored checkpoint was not usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointMiss {
    Absent,
    Unreadable(String),
    Corrupt(String),
    WrongStep(String),
    FormatVersion(u32),
    PayloadDigest,
    Stale,
}

impl fmt::Display for CheckpointMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointMiss::Absent => write!(f, "no checkpoint"),
            CheckpointMiss::Unreadable(e) => write!(f, "checkpoint unreadable: {}", e),
            CheckpointMiss::Corrupt(e) => write!(f, "checkpoint corrupt: {}", e),
            CheckpointMiss::WrongStep(s) => write!(f, "checkpoint belongs to step '{}'", s),
            CheckpointMiss::FormatVersion(v) => write!(f, "unsupported checkpoint format {}", v),
            CheckpointMiss::PayloadDigest => write!(f, "payload digest mismatch"),
            CheckpointMiss::Stale => write!(f, "inputs changed since checkpoint"),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn payload_digest(payload: &Value) -> String {
    // serde_json maps serialize with sorted keys, so a parsed payload re-digests identically
    sha256_hex(payload.to_string().as_bytes())
}

/// Digest over every discovered module (sorted by path, source text included) and the
/// generation options fingerprint.
pub fn inputs_digest(modules: &[Module], fingerprint: &str) -> String {
    let mut entries: Vec<(&Path, &str)> = modules
        .iter()
        .map(|m| (m.source_path.as_path(), m.source.as_str()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (path, source) in entries {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(fingerprint.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Store rooted at `<output_dir>/.toolforge/checkpoints`.
    pub fn new(output_dir: &Path) -> Self {
        Self {
            dir: output_dir.join(STATE_DIR).join(CHECKPOINT_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, step: Step) -> PathBuf {
        self.dir.join(format!("{}.json", step))
    }

    pub fn save(
        &self,
        step: Step,
        inputs_digest: &str,
        payload: Value,
    ) -> Result<PathBuf, CheckpointError> {
        let record = CheckpointRecord {
            step: step.to_string(),
            format_version: CHECKPOINT_FORMAT_VERSION,
            created_at: Utc::now(),
            inputs_digest: inputs_digest.to_string(),
            payload_digest: payload_digest(&payload),
            payload,
        };
        let body = serde_json::to_vec_pretty(&record)
            .map_err(|source| CheckpointError::Serialize { step, source })?;

        let path = self.path_for(step);
        write_atomic(&path, &body).map_err(|source| CheckpointError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(step = %step, path = %path.display(), "Checkpoint written");
        Ok(path)
    }

    /// The stored payload for `step`, or the reason it cannot be reused.
    pub fn inspect(&self, step: Step, inputs_digest: &str) -> Result<Value, CheckpointMiss> {
        let path = self.path_for(step);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CheckpointMiss::Absent),
            Err(e) => return Err(CheckpointMiss::Unreadable(e.to_string())),
        };

        let record: CheckpointRecord = serde_json::from_slice(&body)
            .map_err(|e| CheckpointMiss::Corrupt(e.to_string()))?;

        if record.step != step.as_str() {
            return Err(CheckpointMiss::WrongStep(record.step));
        }
        if record.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointMiss::FormatVersion(record.format_version));
        }
        if payload_digest(&record.payload) != record.payload_digest {
            return Err(CheckpointMiss::PayloadDigest);
        }
        if record.inputs_digest != inputs_digest {
            return Err(CheckpointMiss::Stale);
        }
        Ok(record.payload)
    }

    /// Like [`inspect`](Self::inspect), logging why a present record was rejected.
    pub fn load(&self, step: Step, inputs_digest: &str) -> Option<Value> {
        match self.inspect(step, inputs_digest) {
            Ok(payload) => Some(payload),
            Err(CheckpointMiss::Absent) => {
                debug!(step = %step, "No checkpoint");
                None
            }
            Err(CheckpointMiss::Stale) => {
                debug!(step = %step, "Checkpoint is stale");
                None
            }
            Err(miss) => {
                warn!(step = %step, reason = %miss, "Ignoring invalid checkpoint");
                None
            }
        }
    }

    /// Remove every stored checkpoint.
    pub fn clear(&self) -> std::io::Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let payload = json!({"name": "mcp-server", "tools": ["calculator"]});

        let path = store.save(Step::Manifest, "abc", payload.clone()).unwrap();
        assert!(path.ends_with(".toolforge/checkpoints/manifest.json"));
        assert_eq!(store.inspect(Step::Manifest, "abc"), Ok(payload));
    }

    #[test]
    fn test_stale_inputs_are_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        store.save(Step::Config, "abc", json!("doc")).unwrap();

        assert_eq!(store.inspect(Step::Config, "def"), Err(CheckpointMiss::Stale));
        assert!(store.load(Step::Config, "def").is_none());
    }

    #[test]
    fn test_truncated_record_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let path = store.save(Step::Config, "abc", json!("doc")).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        fs::write(&path, &body[..body.len() / 2]).unwrap();

        assert!(matches!(
            store.inspect(Step::Config, "abc"),
            Err(CheckpointMiss::Corrupt(_))
        ));
    }

    #[test]
    fn test_tampered_payload_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let path = store.save(Step::Config, "abc", json!("doc")).unwrap();

        let mut record: CheckpointRecord =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        record.payload = json!("edited");
        fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        assert_eq!(
            store.inspect(Step::Config, "abc"),
            Err(CheckpointMiss::PayloadDigest)
        );
    }

    #[test]
    fn test_record_for_other_step_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        let path = store.save(Step::Config, "abc", json!("doc")).unwrap();
        fs::copy(&path, store.path_for(Step::Manifest)).unwrap();

        assert_eq!(
            store.inspect(Step::Manifest, "abc"),
            Err(CheckpointMiss::WrongStep("config".to_string()))
        );
    }

    #[test]
    fn test_absent_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert_eq!(store.inspect(Step::Validate, "abc"), Err(CheckpointMiss::Absent));

        store.save(Step::Validate, "abc", json!({})).unwrap();
        store.clear().unwrap();
        assert_eq!(store.inspect(Step::Validate, "abc"), Err(CheckpointMiss::Absent));
        store.clear().unwrap();
    }

    #[test]
    fn test_inputs_digest_ignores_module_order() {
        use crate::module::{ModuleMetadata, SourceLanguage};

        let module = |path: &str, source: &str| {
            let metadata = ModuleMetadata::from_value(json!({
                "name": path, "description": "d", "version": "1.0.0"
            }))
            .unwrap();
            Module::new(
                PathBuf::from(path),
                SourceLanguage::TypeScript,
                metadata,
                None,
                source.to_string(),
            )
        };
        let a = module("/t/a.ts", "a");
        let b = module("/t/b.ts", "b");

        let forward = inputs_digest(&[a.clone(), b.clone()], "opts");
        let reverse = inputs_digest(&[b.clone(), a.clone()], "opts");
        assert_eq!(forward, reverse);
        assert_ne!(forward, inputs_digest(&[a.clone(), b.clone()], "other"));

        let edited = module("/t/b.ts", "b2");
        assert_ne!(forward, inputs_digest(&[a, edited], "opts"));
    }
}
