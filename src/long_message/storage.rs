//! Storage backends for long messages.
//!
//! A [`Storage`] keeps named blobs together with their MD5 and length, and
//! verifies both when a blob is read back. [`LongMessageStorage`] sits on top
//! of two backends and picks one by message type.
//!
//! # Example
//!
//! ```
//! use mcu_link::long_message::{MemoryStorage, Storage};
//!
//! let mut storage = MemoryStorage::new();
//! storage.write("3", b"hello", None).unwrap();
//!
//! let meta = storage.read_metadata("3").unwrap();
//! assert_eq!(meta.md5, "5d41402abc4b2a76b9719d911017c592");
//! assert_eq!(meta.length, 5);
//! assert_eq!(&storage.read("3").unwrap()[..], b"hello");
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::message::{md5_digest, ReceivedLongMessage};
use super::types::{LongMessageStatusInfo, LongMessageType, MD5_SIZE};
use crate::error::{McuLinkError, Result};

/// Metadata stored next to each blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetadata {
    /// Lowercase hex MD5 of the data.
    pub md5: String,
    /// Data length in bytes.
    pub length: u64,
}

/// Named blob storage with integrity metadata.
pub trait Storage: Send {
    /// Read the metadata of `name`.
    fn read_metadata(&self, name: &str) -> Result<StorageMetadata>;

    /// Store `data` under `name`.
    ///
    /// `md5` is the hex digest to record; computed from `data` when `None`.
    fn write(&mut self, name: &str, data: &[u8], md5: Option<&str>) -> Result<()>;

    /// Read and verify the data stored under `name`.
    fn read(&self, name: &str) -> Result<Bytes>;
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn read_metadata(&self, name: &str) -> Result<StorageMetadata> {
        (**self).read_metadata(name)
    }

    fn write(&mut self, name: &str, data: &[u8], md5: Option<&str>) -> Result<()> {
        (**self).write(name, data, md5)
    }

    fn read(&self, name: &str) -> Result<Bytes> {
        (**self).read(name)
    }
}

fn verify(name: &str, data: &[u8], meta: &StorageMetadata) -> Result<()> {
    if data.len() as u64 != meta.length {
        return Err(McuLinkError::StorageIntegrity(format!("{name}: length")));
    }
    if hex::encode(md5_digest(data)) != meta.md5 {
        return Err(McuLinkError::StorageIntegrity(format!("{name}: checksum")));
    }
    Ok(())
}

fn metadata_for(data: &[u8], md5: Option<&str>) -> StorageMetadata {
    StorageMetadata {
        md5: md5.map_or_else(|| hex::encode(md5_digest(data)), str::to_string),
        length: data.len() as u64,
    }
}

/// Volatile storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, (StorageMetadata, Bytes)>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read_metadata(&self, name: &str) -> Result<StorageMetadata> {
        self.entries
            .get(name)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| McuLinkError::StorageNotFound(name.to_string()))
    }

    fn write(&mut self, name: &str, data: &[u8], md5: Option<&str>) -> Result<()> {
        self.entries.insert(
            name.to_string(),
            (metadata_for(data, md5), Bytes::copy_from_slice(data)),
        );
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Bytes> {
        let (meta, data) = self
            .entries
            .get(name)
            .ok_or_else(|| McuLinkError::StorageNotFound(name.to_string()))?;
        verify(name, data, meta)?;
        Ok(data.clone())
    }
}

/// Directory-backed storage.
///
/// Each blob is kept as `<name>.data` with a JSON `<name>.meta` next to it.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    ///
    /// Fails with `McuLinkError::Storage` if the directory is not writable.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .and_then(|_| fs::write(dir.join("access-test"), b"true"))
            .map_err(|e| {
                McuLinkError::Storage(format!(
                    "Storage directory {} is not writable: {e}",
                    dir.display()
                ))
            })?;
        Ok(Self { dir })
    }

    /// Storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.data"))
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.meta"))
    }
}

fn not_found_or(name: &str, e: io::Error) -> McuLinkError {
    if e.kind() == io::ErrorKind::NotFound {
        McuLinkError::StorageNotFound(name.to_string())
    } else {
        McuLinkError::Io(e)
    }
}

impl Storage for FileStorage {
    fn read_metadata(&self, name: &str) -> Result<StorageMetadata> {
        let text = fs::read_to_string(self.meta_path(name)).map_err(|e| not_found_or(name, e))?;
        serde_json::from_str(&text)
            .map_err(|e| McuLinkError::StorageIntegrity(format!("{name}: metadata: {e}")))
    }

    fn write(&mut self, name: &str, data: &[u8], md5: Option<&str>) -> Result<()> {
        let meta = metadata_for(data, md5);
        fs::write(self.data_path(name), data)?;
        fs::write(self.meta_path(name), serde_json::to_vec(&meta)?)?;
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Bytes> {
        let meta = self.read_metadata(name)?;
        let data = fs::read(self.data_path(name)).map_err(|e| not_found_or(name, e))?;
        verify(name, &data, &meta)?;
        Ok(Bytes::from(data))
    }
}

/// Routes long messages to durable or temporary storage by type.
pub struct LongMessageStorage {
    storage: Box<dyn Storage>,
    temp_storage: Box<dyn Storage>,
}

impl LongMessageStorage {
    /// `storage` keeps permanent types, `temp_storage` the rest.
    pub fn new(storage: Box<dyn Storage>, temp_storage: Box<dyn Storage>) -> Self {
        Self {
            storage,
            temp_storage,
        }
    }

    /// Both backends in memory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()), Box::new(MemoryStorage::new()))
    }

    fn backend(&self, message_type: LongMessageType) -> &dyn Storage {
        if message_type.is_permanent() {
            &*self.storage
        } else {
            &*self.temp_storage
        }
    }

    fn backend_mut(&mut self, message_type: LongMessageType) -> &mut dyn Storage {
        if message_type.is_permanent() {
            &mut *self.storage
        } else {
            &mut *self.temp_storage
        }
    }

    /// `Ready` with the stored digest and length, or `Unused` when nothing
    /// usable is stored.
    pub fn read_status(&self, message_type: LongMessageType) -> LongMessageStatusInfo {
        let name = message_type.storage_name();
        let meta = match self.backend(message_type).read_metadata(&name) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(%message_type, error = %e, "no stored long message");
                return LongMessageStatusInfo::Unused;
            }
        };

        let mut md5 = [0u8; MD5_SIZE];
        match (hex::decode_to_slice(&meta.md5, &mut md5), u32::try_from(meta.length)) {
            (Ok(()), Ok(length)) => LongMessageStatusInfo::Ready { md5, length },
            _ => {
                tracing::warn!(%message_type, ?meta, "stored long message has bad metadata");
                LongMessageStatusInfo::Unused
            }
        }
    }

    /// Store a received message under its type.
    pub fn set_long_message(&mut self, message: &ReceivedLongMessage) -> Result<()> {
        let message_type = message.message_type();
        tracing::debug!(%message_type, bytes = message.len(), "storing long message");
        self.backend_mut(message_type).write(
            &message_type.storage_name(),
            message.data(),
            Some(&message.md5_hex()),
        )
    }

    /// Read the stored message of a type.
    pub fn get_long_message(&self, message_type: LongMessageType) -> Result<Bytes> {
        self.backend(message_type)
            .read(&message_type.storage_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.read_metadata("1"),
            Err(McuLinkError::StorageNotFound(_))
        ));
        assert!(matches!(
            storage.read("1"),
            Err(McuLinkError::StorageNotFound(_))
        ));
    }

    #[test]
    fn test_memory_wrong_md5_fails_read() {
        let mut storage = MemoryStorage::new();
        storage
            .write("1", b"hello", Some("00000000000000000000000000000000"))
            .unwrap();
        assert!(matches!(
            storage.read("1"),
            Err(McuLinkError::StorageIntegrity(_))
        ));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path().join("data")).unwrap();
        assert!(dir.path().join("data").join("access-test").exists());

        storage.write("2", b"framework", None).unwrap();
        assert!(dir.path().join("data").join("2.data").exists());

        let meta = storage.read_metadata("2").unwrap();
        assert_eq!(meta.length, 9);
        assert_eq!(&storage.read("2").unwrap()[..], b"framework");
    }

    #[test]
    fn test_file_storage_detects_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();
        storage.write("5", b"asset data", None).unwrap();

        fs::write(dir.path().join("5.data"), b"asset").unwrap();
        assert!(matches!(
            storage.read("5"),
            Err(McuLinkError::StorageIntegrity(_))
        ));
    }

    #[test]
    fn test_file_storage_bad_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(dir.path()).unwrap();
        storage.write("1", b"x", None).unwrap();

        fs::write(dir.path().join("1.meta"), b"{not json").unwrap();
        assert!(matches!(
            storage.read("1"),
            Err(McuLinkError::StorageIntegrity(_))
        ));
    }

    #[test]
    fn test_file_storage_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        assert!(matches!(
            storage.read("4"),
            Err(McuLinkError::StorageNotFound(_))
        ));
    }

    #[test]
    fn test_routing_by_type() {
        let mut storage = LongMessageStorage::in_memory();

        let mut message = ReceivedLongMessage::new(
            LongMessageType::Configuration,
            md5_digest(b"cfg"),
            3,
        );
        message.append_data(b"cfg");
        storage.set_long_message(&message).unwrap();

        assert!(storage.temp_storage.read("3").is_ok());
        assert!(storage.storage.read("3").is_err());

        match storage.read_status(LongMessageType::Configuration) {
            LongMessageStatusInfo::Ready { md5, length } => {
                assert_eq!(md5, md5_digest(b"cfg"));
                assert_eq!(length, 3);
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(
            storage.read_status(LongMessageType::Firmware),
            LongMessageStatusInfo::Unused
        );
    }

    #[test]
    fn test_status_with_corrupt_digest_is_unused() {
        let mut temp = MemoryStorage::new();
        temp.write("4", b"kit", Some("zz")).unwrap();
        let storage = LongMessageStorage::new(Box::new(MemoryStorage::new()), Box::new(temp));
        assert_eq!(
            storage.read_status(LongMessageType::TestKit),
            LongMessageStatusInfo::Unused
        );
    }
}
