//! Firmware versions, local images and the update flow.

mod loader;
mod updater;
mod version;

pub use loader::{CatalogEntry, FirmwareImage, FirmwareLoader, CATALOG_FILE};
pub use updater::{update_firmware, McuUpdater};
pub use version::{Version, STABLE_BRANCH};
