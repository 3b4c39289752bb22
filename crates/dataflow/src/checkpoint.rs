//! Durable keyed datasets with all-or-nothing commits.
//!
//! A checkpoint is a directory holding one record file and a `_SUCCESS`
//! manifest. Both are written into a staging directory beside the target and
//! renamed into place, so a path either has a complete, committed checkpoint
//! or nothing readable at all. Reads verify the manifest's BLAKE3 digest.

use chrono::{DateTime, Utc};
use grove_core::serialization::{canonical_json_string, digest_hex};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::{DataflowError, Result};

const PART_FILE: &str = "part-00000";
const MANIFEST_FILE: &str = "_SUCCESS";
const STEP_PREFIX: &str = "step_";

/// Record encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// One JSON array `[key, value]` per line
    #[default]
    JsonLines,
    /// Little-endian `u64` length prefix followed by a bincode record
    Bincode,
}

/// Commit marker contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: Format,
    pub records: usize,
    /// BLAKE3 hex digest of the record file
    pub digest: String,
    pub created_at: DateTime<Utc>,
    pub version: String,
}

/// Conventional name of the checkpoint written by pipeline step `step`.
pub fn step_name(step: usize) -> String {
    format!("{STEP_PREFIX}{step:02}")
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
    format: Format,
}

impl CheckpointStore {
    pub fn open(root: impl Into<PathBuf>, format: Format) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, format })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn is_committed(&self, name: &str) -> bool {
        self.path_of(name).join(MANIFEST_FILE).is_file()
    }

    /// Write `records` under `name` and commit atomically.
    ///
    /// Refuses to overwrite a committed checkpoint. Leftovers of an aborted
    /// write at the same path are discarded first.
    pub fn write<K, V>(&self, name: &str, records: &[(K, V)]) -> Result<Manifest>
    where
        K: Serialize,
        V: Serialize,
    {
        let dest = self.path_of(name);
        if self.is_committed(name) {
            return Err(DataflowError::AlreadyCommitted(dest));
        }
        if dest.exists() {
            warn!("Discarding uncommitted checkpoint at {}", dest.display());
            fs::remove_dir_all(&dest)?;
        }
        let parent = dest.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let bytes = encode(self.format, records)?;
        let manifest = Manifest {
            format: self.format,
            records: records.len(),
            digest: digest_hex(&bytes),
            created_at: Utc::now(),
            version: grove_core::VERSION.to_string(),
        };

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)?;
        fs::write(staging.path().join(PART_FILE), &bytes)?;
        fs::write(
            staging.path().join(MANIFEST_FILE),
            canonical_json_string(&manifest)?,
        )?;
        fs::rename(staging.path(), &dest)?;

        info!(
            "Committed checkpoint {} ({} records, digest {})",
            dest.display(),
            manifest.records,
            &manifest.digest[..12]
        );
        Ok(manifest)
    }

    pub fn manifest(&self, name: &str) -> Result<Manifest> {
        let path = self.path_of(name);
        if !self.is_committed(name) {
            return Err(DataflowError::NotCommitted(path));
        }
        let raw = fs::read(path.join(MANIFEST_FILE))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Read a committed checkpoint, verifying its digest.
    pub fn read<K, V>(&self, name: &str) -> Result<Vec<(K, V)>>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        let manifest = self.manifest(name)?;
        let path = self.path_of(name);
        let bytes = fs::read(path.join(PART_FILE))?;
        let actual = digest_hex(&bytes);
        if actual != manifest.digest {
            return Err(DataflowError::DigestMismatch {
                path,
                expected: manifest.digest,
                actual,
            });
        }
        let records = decode(manifest.format, &bytes, &path)?;
        if records.len() != manifest.records {
            return Err(DataflowError::Corrupt {
                path,
                reason: format!(
                    "manifest lists {} records, found {}",
                    manifest.records,
                    records.len()
                ),
            });
        }
        debug!("Read checkpoint {} ({} records)", path.display(), records.len());
        Ok(records)
    }

    /// Highest step index with a committed `step_NN` checkpoint.
    pub fn latest_step(&self) -> Result<Option<usize>> {
        let mut latest = None;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(step) = name
                .strip_prefix(STEP_PREFIX)
                .and_then(|digits| digits.parse::<usize>().ok())
            else {
                continue;
            };
            if self.is_committed(name) {
                latest = latest.max(Some(step));
            }
        }
        Ok(latest)
    }
}

fn encode<K: Serialize, V: Serialize>(format: Format, records: &[(K, V)]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match format {
        Format::JsonLines => {
            for record in records {
                serde_json::to_writer(&mut buffer, record)?;
                buffer.push(b'\n');
            }
        }
        Format::Bincode => {
            for record in records {
                let encoded = bincode::serialize(record)?;
                buffer.extend_from_slice(&(encoded.len() as u64).to_le_bytes());
                buffer.extend_from_slice(&encoded);
            }
        }
    }
    Ok(buffer)
}

fn decode<K, V>(format: Format, bytes: &[u8], path: &Path) -> Result<Vec<(K, V)>>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    let mut records = Vec::new();
    match format {
        Format::JsonLines => {
            for line in bytes.split(|b| *b == b'\n').filter(|line| !line.is_empty()) {
                records.push(serde_json::from_slice(line)?);
            }
        }
        Format::Bincode => {
            let mut rest = bytes;
            while !rest.is_empty() {
                if rest.len() < 8 {
                    return Err(corrupt(path, "truncated length prefix"));
                }
                let (prefix, tail) = rest.split_at(8);
                let mut len = [0u8; 8];
                len.copy_from_slice(prefix);
                let len = u64::from_le_bytes(len) as usize;
                if tail.len() < len {
                    return Err(corrupt(path, "truncated record"));
                }
                let (record, tail) = tail.split_at(len);
                records.push(bincode::deserialize(record)?);
                rest = tail;
            }
        }
    }
    Ok(records)
}

fn corrupt(path: &Path, reason: &str) -> DataflowError {
    DataflowError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn records() -> Vec<(usize, String)> {
        vec![(0, "root".to_string()), (1, "left".to_string())]
    }

    #[test]
    fn write_then_read_roundtrip_in_both_formats() -> Result<()> {
        for format in [Format::JsonLines, Format::Bincode] {
            let dir = TempDir::new()?;
            let store = CheckpointStore::open(dir.path(), format)?;
            let manifest = store.write("step_01", &records())?;
            assert_eq!(manifest.records, 2);
            assert_eq!(manifest.format, format);
            let back: Vec<(usize, String)> = store.read("step_01")?;
            assert_eq!(back, records());
        }
        Ok(())
    }

    #[test]
    fn committed_path_is_not_overwritten() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CheckpointStore::open(dir.path(), Format::JsonLines)?;
        store.write("step_00", &records())?;
        let err = store.write("step_00", &records()).unwrap_err();
        assert!(matches!(err, DataflowError::AlreadyCommitted(_)));
        Ok(())
    }

    #[test]
    fn uncommitted_directory_is_invisible_and_replaced() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CheckpointStore::open(dir.path(), Format::JsonLines)?;
        fs::create_dir_all(store.path_of("step_03"))?;
        fs::write(store.path_of("step_03").join(PART_FILE), b"partial")?;

        assert!(!store.is_committed("step_03"));
        let err = store.read::<usize, String>("step_03").unwrap_err();
        assert!(matches!(err, DataflowError::NotCommitted(_)));
        assert_eq!(store.latest_step()?, None);

        store.write("step_03", &records())?;
        assert_eq!(store.latest_step()?, Some(3));
        Ok(())
    }

    #[test]
    fn tampered_records_fail_digest_check() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CheckpointStore::open(dir.path(), Format::JsonLines)?;
        store.write("step_01", &records())?;
        fs::write(
            store.path_of("step_01").join(PART_FILE),
            b"[0,\"tampered\"]\n",
        )?;
        let err = store.read::<usize, String>("step_01").unwrap_err();
        assert!(matches!(err, DataflowError::DigestMismatch { .. }));
        Ok(())
    }

    #[test]
    fn latest_step_ignores_other_entries() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CheckpointStore::open(dir.path(), Format::Bincode)?;
        store.write(&step_name(0), &records())?;
        store.write(&step_name(12), &records())?;
        store.write("report", &records())?;
        assert_eq!(store.latest_step()?, Some(12));
        assert_eq!(step_name(7), "step_07");
        Ok(())
    }
}
