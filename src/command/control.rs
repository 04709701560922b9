//! Control interfaces bundling the command table for each MCU mode.
//!
//! The MCU answers on two bus addresses: the application firmware on one,
//! the bootloader on the other. [`ApplicationControl`] and
//! [`BootloaderControl`] expose the commands valid in each mode as plain
//! methods over a shared [`CommandLink`].

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use super::commands::*;
use super::dispatch::{execute, Command};
use crate::config::LinkConfig;
use crate::error::Result;
use crate::firmware::Version;
use crate::transport::{ByteChannel, CommandLink, LinkTransport};

/// Result of a command after which the MCU restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootOutcome {
    /// The MCU acknowledged before restarting.
    Acknowledged,
    /// The link dropped, as expected while the MCU restarts.
    Disconnected,
}

/// Run a command that makes the MCU restart.
///
/// Link loss is the expected way for such a command to end and is reported
/// as [`RebootOutcome::Disconnected`]; every other error is returned.
fn expect_restart(result: Result<()>, command: &str) -> Result<RebootOutcome> {
    match result {
        Ok(()) => Ok(RebootOutcome::Acknowledged),
        Err(e) if e.is_link_loss() => {
            tracing::debug!(command, error = %e, "link dropped while MCU restarts");
            Ok(RebootOutcome::Disconnected)
        }
        Err(e) => Err(e),
    }
}

/// Commands available while the application firmware runs.
#[derive(Clone)]
pub struct ApplicationControl {
    link: Arc<dyn CommandLink>,
}

impl ApplicationControl {
    /// Bind the command table to a link.
    pub fn new(link: Arc<dyn CommandLink>) -> Self {
        Self { link }
    }

    /// Get the underlying link.
    pub fn link(&self) -> &Arc<dyn CommandLink> {
        &self.link
    }

    pub fn ping(&self) -> Result<()> {
        execute::<Ping>(&*self.link, &())
    }

    pub fn set_master_status(&self, status: u8) -> Result<()> {
        execute::<SetMasterStatus>(&*self.link, &status)
    }

    pub fn set_bluetooth_connection_status(&self, status: u8) -> Result<()> {
        execute::<SetBluetoothStatus>(&*self.link, &status)
    }

    pub fn get_hardware_version(&self) -> Result<Option<Version>> {
        execute::<ReadHardwareVersion>(&*self.link, &())
    }

    pub fn get_firmware_version(&self) -> Result<Option<Version>> {
        execute::<ReadFirmwareVersion>(&*self.link, &())
    }

    pub fn read_operation_mode(&self) -> Result<OperationMode> {
        execute::<ReadOperationMode>(&*self.link, &())
    }

    /// Ask the MCU to restart into the bootloader.
    pub fn reboot_bootloader(&self) -> Result<RebootOutcome> {
        expect_restart(
            execute::<RebootToBootloader>(&*self.link, &()),
            RebootToBootloader::NAME,
        )
    }

    pub fn get_motor_port_amount(&self) -> Result<u8> {
        execute::<ReadMotorPortAmount>(&*self.link, &())
    }

    pub fn get_motor_port_types(&self) -> Result<HashMap<String, u8>> {
        execute::<ReadMotorPortTypes>(&*self.link, &())
    }

    pub fn set_motor_port_type(&self, port: u8, type_index: u8) -> Result<()> {
        execute::<SetMotorPortType>(&*self.link, &(port, type_index))
    }

    pub fn set_motor_port_config(&self, port: u8, config: &[u8]) -> Result<()> {
        execute::<SetMotorPortConfig>(&*self.link, &(port, config.to_vec()))
    }

    pub fn set_motor_port_control_value(&self, control: &[u8]) -> Result<()> {
        execute::<SetMotorPortControl>(&*self.link, control)
    }

    pub fn get_sensor_port_amount(&self) -> Result<u8> {
        execute::<ReadSensorPortAmount>(&*self.link, &())
    }

    pub fn get_sensor_port_types(&self) -> Result<HashMap<String, u8>> {
        execute::<ReadSensorPortTypes>(&*self.link, &())
    }

    pub fn set_sensor_port_type(&self, port: u8, type_index: u8) -> Result<()> {
        execute::<SetSensorPortType>(&*self.link, &(port, type_index))
    }

    pub fn write_sensor_port(&self, port: u8, data: &[u8]) -> Result<()> {
        execute::<WriteSensorPort>(&*self.link, &(port, data.to_vec()))
    }

    pub fn read_sensor_info(&self, port: u8, page: u8) -> Result<Bytes> {
        execute::<ReadSensorPortInfo>(&*self.link, &(port, page))
    }

    pub fn ring_led_get_scenario_types(&self) -> Result<HashMap<String, u8>> {
        execute::<ReadRingLedScenarioTypes>(&*self.link, &())
    }

    pub fn ring_led_set_scenario(&self, scenario: u8) -> Result<()> {
        execute::<SetRingLedScenario>(&*self.link, &scenario)
    }

    pub fn ring_led_get_led_amount(&self) -> Result<u8> {
        execute::<ReadRingLedAmount>(&*self.link, &())
    }

    /// Show one `0xRRGGBB` color per LED.
    pub fn ring_led_set_user_frame(&self, colors: &[u32]) -> Result<()> {
        execute::<SendRingLedUserFrame>(&*self.link, colors)
    }

    pub fn status_updater_reset(&self) -> Result<()> {
        execute::<StatusUpdaterReset>(&*self.link, &())
    }

    pub fn status_updater_control(&self, slot: u8, enabled: bool) -> Result<()> {
        execute::<StatusUpdaterControl>(&*self.link, &(slot, enabled))
    }

    pub fn status_updater_read(&self) -> Result<Bytes> {
        execute::<StatusUpdaterRead>(&*self.link, &())
    }

    pub fn error_memory_read_count(&self) -> Result<u32> {
        execute::<ReadErrorCount>(&*self.link, &())
    }

    /// Read error records starting at `start_index`.
    pub fn error_memory_read_errors(&self, start_index: u32) -> Result<Vec<Bytes>> {
        execute::<ReadErrors>(&*self.link, &start_index)
    }

    pub fn error_memory_clear(&self) -> Result<()> {
        execute::<ClearErrors>(&*self.link, &())
    }

    pub fn error_memory_test(&self) -> Result<()> {
        execute::<RecordTestError>(&*self.link, &())
    }
}

/// Commands available while the bootloader runs.
#[derive(Clone)]
pub struct BootloaderControl {
    link: Arc<dyn CommandLink>,
}

impl BootloaderControl {
    /// Bind the command table to a link.
    pub fn new(link: Arc<dyn CommandLink>) -> Self {
        Self { link }
    }

    pub fn get_hardware_version(&self) -> Result<Option<Version>> {
        execute::<ReadHardwareVersion>(&*self.link, &())
    }

    pub fn read_operation_mode(&self) -> Result<OperationMode> {
        execute::<ReadOperationMode>(&*self.link, &())
    }

    /// CRC-32 of the application image in flash.
    pub fn read_firmware_crc(&self) -> Result<u32> {
        execute::<ReadFirmwareCrc>(&*self.link, &())
    }

    /// Announce an image of `length` bytes with the given CRC-32.
    pub fn send_init_update(&self, length: u32, checksum: u32) -> Result<()> {
        execute::<InitializeUpdate>(&*self.link, &(length, checksum))
    }

    /// Send one chunk of at most 255 bytes.
    pub fn send_firmware(&self, chunk: &[u8]) -> Result<()> {
        execute::<SendFirmware>(&*self.link, chunk)
    }

    /// Finish the update. The MCU jumps to the new application and may not
    /// acknowledge.
    pub fn finalize_update(&self) -> Result<RebootOutcome> {
        expect_restart(
            execute::<FinalizeUpdate>(&*self.link, &()),
            FinalizeUpdate::NAME,
        )
    }
}

/// Both control interfaces of one MCU.
#[derive(Clone)]
pub struct McuInterfaces {
    pub application: ApplicationControl,
    pub bootloader: BootloaderControl,
}

impl McuInterfaces {
    /// Build from two command links.
    pub fn new(application: Arc<dyn CommandLink>, bootloader: Arc<dyn CommandLink>) -> Self {
        Self {
            application: ApplicationControl::new(application),
            bootloader: BootloaderControl::new(bootloader),
        }
    }

    /// Build from one byte channel per bus address.
    ///
    /// See [`APPLICATION_I2C_ADDRESS`](crate::config::APPLICATION_I2C_ADDRESS)
    /// and [`BOOTLOADER_I2C_ADDRESS`](crate::config::BOOTLOADER_I2C_ADDRESS).
    pub fn from_channels<A, B>(application: A, bootloader: B, config: &LinkConfig) -> Self
    where
        A: ByteChannel + 'static,
        B: ByteChannel + 'static,
    {
        Self::new(
            Arc::new(LinkTransport::with_config(application, config.clone())),
            Arc::new(LinkTransport::with_config(bootloader, config.clone())),
        )
    }
}
