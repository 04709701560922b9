//! Local firmware images and their catalog.
//!
//! A firmware directory holds the images and a `catalog.json` mapping each
//! hardware version to the image built for it:
//!
//! ```json
//! {
//!     "1.0.0": {
//!         "filename": "rrrc_samd51.bin",
//!         "md5": "5d41402abc4b2a76b9719d911017c592",
//!         "length": 5,
//!         "version": "0.2.1024"
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Deserialize;

use super::version::Version;
use crate::error::{McuLinkError, Result};
use crate::long_message::md5_digest;

/// File name of the catalog inside the firmware directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub filename: String,
    /// Lowercase hex MD5 of the image.
    pub md5: String,
    pub length: usize,
    pub version: Version,
}

/// A firmware image that passed the catalog checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    pub version: Version,
    pub data: Bytes,
    /// CRC-32 of `data`, as the bootloader computes it.
    pub crc: u32,
}

impl FirmwareImage {
    pub fn new(version: Version, data: Bytes) -> Self {
        let crc = crc32fast::hash(&data);
        Self { version, data, crc }
    }
}

/// Reads firmware images from a directory.
#[derive(Debug, Clone)]
pub struct FirmwareLoader {
    dir: PathBuf,
}

impl FirmwareLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up the catalog entry for `hw_version`.
    pub fn catalog_entry(&self, hw_version: &Version) -> Result<CatalogEntry> {
        let path = self.dir.join(CATALOG_FILE);
        let text = fs::read_to_string(&path).map_err(|e| {
            McuLinkError::FirmwareCatalog(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut catalog: HashMap<String, CatalogEntry> = serde_json::from_str(&text)
            .map_err(|e| McuLinkError::FirmwareCatalog(format!("invalid catalog: {e}")))?;

        let key = hw_version.to_string();
        catalog
            .remove(&key)
            .ok_or_else(|| McuLinkError::FirmwareCatalog(format!("no firmware for hardware {key}")))
    }

    /// Load and validate the image for `hw_version`.
    ///
    /// The image must have exactly the catalog length and MD5.
    pub fn get_firmware(&self, hw_version: &Version) -> Result<FirmwareImage> {
        let entry = self.catalog_entry(hw_version)?;
        let data = fs::read(self.dir.join(&entry.filename)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                tracing::error!(file = %entry.filename, "firmware file does not exist");
            }
            McuLinkError::Io(e)
        })?;

        if data.len() != entry.length {
            tracing::error!(
                expected = entry.length,
                actual = data.len(),
                "firmware file length check failed"
            );
            return Err(McuLinkError::FirmwareIntegrity(
                "firmware file length does not match".into(),
            ));
        }

        if hex::encode(md5_digest(&data)) != entry.md5.to_ascii_lowercase() {
            tracing::error!(file = %entry.filename, "firmware file integrity check failed");
            return Err(McuLinkError::FirmwareIntegrity(
                "firmware file checksum does not match".into(),
            ));
        }

        Ok(FirmwareImage::new(entry.version, Bytes::from(data)))
    }
}
