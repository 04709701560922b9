//! Firmware update flow.
//!
//! The MCU runs either the application or the bootloader, each answering on
//! its own interface. The updater finds out which one is running, decides
//! whether the local image has to be flashed, streams it to the bootloader
//! and starts the new application.

use std::thread;
use std::time::Instant;

use super::loader::{FirmwareImage, FirmwareLoader};
use super::version::Version;
use crate::command::{McuInterfaces, OperationMode, RebootOutcome};
use crate::config::UpdaterConfig;
use crate::error::{McuLinkError, Result};
use crate::protocol::MAX_PAYLOAD_SIZE;

/// Drives a firmware update over a pair of control interfaces.
pub struct McuUpdater {
    interfaces: McuInterfaces,
    config: UpdaterConfig,
}

impl McuUpdater {
    pub fn new(interfaces: McuInterfaces) -> Self {
        Self::with_config(interfaces, UpdaterConfig::default())
    }

    pub fn with_config(interfaces: McuInterfaces, config: UpdaterConfig) -> Self {
        Self { interfaces, config }
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Find out whether the application or the bootloader is running.
    ///
    /// Both interfaces are asked in turn until one answers or the detection
    /// window runs out. Only link loss is retried.
    pub fn read_operation_mode(&self) -> Result<OperationMode> {
        let start = Instant::now();
        while start.elapsed() < self.config.mode_detect_timeout {
            match self.interfaces.application.read_operation_mode() {
                Err(e) if e.is_link_loss() => {}
                result => return result,
            }
            match self.interfaces.bootloader.read_operation_mode() {
                Err(e) if e.is_link_loss() => {}
                result => return result,
            }

            tracing::debug!("failed to read operation mode, retrying");
            thread::sleep(self.config.mode_poll_interval);
        }

        tracing::warn!(
            timeout_ms = self.config.mode_detect_timeout.as_millis() as u64,
            "could not determine operation mode"
        );
        Err(McuLinkError::OperationModeTimeout)
    }

    /// Read the hardware version from whichever interface answers.
    pub fn read_hardware_version(&self) -> Result<Version> {
        let version = match self.interfaces.application.get_hardware_version() {
            Err(e) if e.is_link_loss() => self.interfaces.bootloader.get_hardware_version()?,
            result => result?,
        };
        version.ok_or_else(|| McuLinkError::InvalidResponse("unparsable hardware version".into()))
    }

    /// Decide whether `image` has to be flashed.
    ///
    /// A different application version always needs an update, downgrades
    /// included. A matching stable version is trusted without rebooting.
    /// A matching development version is checked against the CRC of the
    /// flashed image, which needs the bootloader.
    pub fn is_update_needed(&self, image: &FirmwareImage) -> Result<bool> {
        match self.read_operation_mode()? {
            OperationMode::Application => {
                let running = self.interfaces.application.get_firmware_version()?;
                if running.as_ref() != Some(&image.version) {
                    tracing::info!(
                        running = ?running.map(|v| v.to_string()),
                        available = %image.version,
                        "firmware version differs"
                    );
                    Ok(true)
                } else if image.version.is_stable() {
                    Ok(false)
                } else {
                    self.reboot_to_bootloader()?;
                    let crc = self.interfaces.bootloader.read_firmware_crc()?;
                    tracing::info!(
                        flashed = format_args!("{crc:#010x}"),
                        expected = format_args!("{:#010x}", image.crc),
                        "compared flashed image"
                    );
                    Ok(crc != image.crc)
                }
            }
            // No usable application, most likely.
            OperationMode::Bootloader => Ok(true),
        }
    }

    /// Restart into the bootloader if the application is running.
    pub fn reboot_to_bootloader(&self) -> Result<()> {
        if self.read_operation_mode()? != OperationMode::Application {
            return Ok(());
        }

        tracing::info!("rebooting to bootloader");
        if self.interfaces.application.reboot_bootloader()? == RebootOutcome::Disconnected {
            tracing::info!("MCU restarted before finishing communication");
        }

        match self.read_operation_mode()? {
            OperationMode::Bootloader => Ok(()),
            mode => Err(McuLinkError::UnexpectedMode(mode)),
        }
    }

    /// Flash `image` through the bootloader.
    pub fn upload_binary(&self, image: &FirmwareImage) -> Result<()> {
        let length = u32::try_from(image.data.len()).map_err(|_| {
            McuLinkError::FirmwareIntegrity(format!("image too large ({} bytes)", image.data.len()))
        })?;

        self.reboot_to_bootloader()?;

        tracing::info!(
            size = length,
            checksum = format_args!("{:#010x}", image.crc),
            "initializing update"
        );
        self.interfaces.bootloader.send_init_update(length, image.crc)?;

        let chunk_size = self.config.chunk_size.clamp(1, MAX_PAYLOAD_SIZE);
        let start = Instant::now();
        for chunk in image.data.chunks(chunk_size) {
            self.interfaces.bootloader.send_firmware(chunk)?;
        }
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "firmware data sent"
        );
        Ok(())
    }

    /// Start the application if the bootloader is still running.
    pub fn finalize(&self) -> Result<()> {
        if self.read_operation_mode()? != OperationMode::Bootloader {
            return Ok(());
        }

        if self.interfaces.bootloader.finalize_update()? == RebootOutcome::Disconnected {
            tracing::info!("MCU restarted before finishing communication");
        }

        match self.read_operation_mode()? {
            OperationMode::Application => Ok(()),
            mode => Err(McuLinkError::UnexpectedMode(mode)),
        }
    }
}

/// Bring the MCU firmware in line with the image for `hw_version`.
///
/// The local image is validated before anything is sent; catalog and
/// integrity failures are logged and returned. Returns whether an image was
/// flashed.
pub fn update_firmware(
    loader: &FirmwareLoader,
    interfaces: McuInterfaces,
    hw_version: &Version,
    config: UpdaterConfig,
) -> Result<bool> {
    let image = match loader.get_firmware(hw_version) {
        Ok(image) => image,
        Err(e) => {
            match &e {
                McuLinkError::FirmwareCatalog(_) => {
                    tracing::error!(hardware = %hw_version, error = %e, "no firmware for the hardware")
                }
                McuLinkError::FirmwareIntegrity(_) => {
                    tracing::error!(error = %e, "firmware file corrupted")
                }
                _ => tracing::error!(error = %e, "firmware file is not readable"),
            }
            return Err(e);
        }
    };

    let updater = McuUpdater::with_config(interfaces, config);
    let needed = updater.is_update_needed(&image)?;
    if needed {
        updater.upload_binary(&image)?;
    }
    updater.finalize()?;

    tracing::info!(version = %image.version, flashed = needed, "firmware up to date");
    Ok(needed)
}
