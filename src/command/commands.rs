//! The MCU command table.
//!
//! Application-mode commands live at `0x00..=0x06`, `0x0B` and `0x10..=0x40`.
//! Bootloader-mode commands use `0x01`, `0x06` and `0x07..=0x0A`.

use std::collections::HashMap;

use bytes::Bytes;

use super::dispatch::Command;
use crate::error::{McuLinkError, Result};
use crate::firmware::Version;

/// Size of one record returned by the error memory.
pub const ERROR_RECORD_SIZE: usize = 63;

/// Operation mode reported by command 0x06.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationMode {
    Application = 0xAA,
    Bootloader = 0xBB,
}

impl TryFrom<u8> for OperationMode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0xAA => Ok(OperationMode::Application),
            0xBB => Ok(OperationMode::Bootloader),
            other => Err(other),
        }
    }
}

macro_rules! command {
    (
        $(#[$meta:meta])*
        $name:ident = $id:literal, ($args:ty) -> $output:ty, $encode:expr, $decode:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl Command for $name {
            const ID: u8 = $id;
            const NAME: &'static str = stringify!($name);

            type Args = $args;
            type Output = $output;

            fn encode(args: &Self::Args) -> Result<Vec<u8>> {
                $encode(args)
            }

            fn decode(payload: Bytes) -> Result<Self::Output> {
                $decode(payload)
            }
        }
    };
}

// Application commands

command! {
    /// Check that the MCU answers.
    Ping = 0x00, (()) -> (), no_args, no_response
}

command! {
    /// Read the hardware version. `None` if the MCU sent something unparsable.
    ReadHardwareVersion = 0x01, (()) -> Option<Version>, no_args, version
}

command! {
    /// Read the firmware version. `None` if the MCU sent something unparsable.
    ReadFirmwareVersion = 0x02, (()) -> Option<Version>, no_args, version
}

command! {
    SetMasterStatus = 0x04, (u8) -> (), one_byte, no_response
}

command! {
    SetBluetoothStatus = 0x05, (u8) -> (), one_byte, no_response
}

command! {
    /// Read whether the MCU runs the application or the bootloader.
    ReadOperationMode = 0x06, (()) -> OperationMode, no_args, operation_mode
}

command! {
    /// Restart the MCU into bootloader mode. The MCU may drop off the bus
    /// before acknowledging.
    RebootToBootloader = 0x0B, (()) -> (), no_args, no_response
}

command! {
    ReadMotorPortAmount = 0x10, (()) -> u8, no_args, single_byte
}

command! {
    /// Read the available motor driver names and their indexes.
    ReadMotorPortTypes = 0x11, (()) -> HashMap<String, u8>, no_args, string_list
}

command! {
    /// Arguments: `(port, type index)`.
    SetMotorPortType = 0x12, ((u8, u8)) -> (), two_bytes, no_response
}

command! {
    /// Arguments: `(port, driver configuration)`.
    SetMotorPortConfig = 0x13, ((u8, Vec<u8>)) -> (), port_and_bytes, no_response
}

command! {
    /// Send pre-encoded motor control values.
    SetMotorPortControl = 0x14, ([u8]) -> (), raw, no_response
}

command! {
    ReadSensorPortAmount = 0x20, (()) -> u8, no_args, single_byte
}

command! {
    /// Read the available sensor driver names and their indexes.
    ReadSensorPortTypes = 0x21, (()) -> HashMap<String, u8>, no_args, string_list
}

command! {
    /// Arguments: `(port, type index)`.
    SetSensorPortType = 0x22, ((u8, u8)) -> (), two_bytes, no_response
}

command! {
    /// Arguments: `(port, data)`.
    WriteSensorPort = 0x23, ((u8, Vec<u8>)) -> (), port_and_bytes, no_response
}

command! {
    /// Arguments: `(port, page)`. Returns the raw info page.
    ReadSensorPortInfo = 0x24, ((u8, u8)) -> Bytes, two_bytes, raw_response
}

command! {
    ReadRingLedScenarioTypes = 0x30, (()) -> HashMap<String, u8>, no_args, string_list
}

command! {
    SetRingLedScenario = 0x31, (u8) -> (), one_byte, no_response
}

command! {
    ReadRingLedAmount = 0x32, (()) -> u8, no_args, single_byte
}

command! {
    /// Show a user frame: one 24-bit RGB color per LED.
    SendRingLedUserFrame = 0x33, ([u32]) -> (), rgb565_frame, no_response
}

command! {
    StatusUpdaterReset = 0x3A, (()) -> (), no_args, no_response
}

command! {
    /// Arguments: `(slot, enabled)`.
    StatusUpdaterControl = 0x3B, ((u8, bool)) -> (), slot_control, no_response
}

command! {
    /// Read the slot stream `[slot][len][data]...`.
    StatusUpdaterRead = 0x3C, (()) -> Bytes, no_args, raw_response
}

command! {
    ReadErrorCount = 0x3D, (()) -> u32, no_args, u32_le
}

command! {
    /// Argument: index of the first record to read.
    ReadErrors = 0x3E, (u32) -> Vec<Bytes>, start_index, error_records
}

command! {
    ClearErrors = 0x3F, (()) -> (), no_args, no_response
}

command! {
    /// Make the MCU record a test error.
    RecordTestError = 0x40, (()) -> (), no_args, no_response
}

// Bootloader commands

command! {
    /// Read the CRC-32 of the application image currently flashed.
    ReadFirmwareCrc = 0x07, (()) -> u32, no_args, u32_le
}

command! {
    /// Arguments: `(image length, image CRC-32)`.
    InitializeUpdate = 0x08, ((u32, u32)) -> (), update_info, no_response
}

command! {
    /// Send one chunk of the firmware image.
    SendFirmware = 0x09, ([u8]) -> (), raw, no_response
}

command! {
    /// Finish the update and start the new application.
    FinalizeUpdate = 0x0A, (()) -> (), no_args, no_response
}

// Encoders

fn no_args(_: &()) -> Result<Vec<u8>> {
    Ok(Vec::new())
}

fn one_byte(value: &u8) -> Result<Vec<u8>> {
    Ok(vec![*value])
}

fn two_bytes(&(first, second): &(u8, u8)) -> Result<Vec<u8>> {
    Ok(vec![first, second])
}

fn port_and_bytes((port, data): &(u8, Vec<u8>)) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(1 + data.len());
    payload.push(*port);
    payload.extend_from_slice(data);
    Ok(payload)
}

fn raw(data: &[u8]) -> Result<Vec<u8>> {
    Ok(data.to_vec())
}

fn slot_control(&(slot, enabled): &(u8, bool)) -> Result<Vec<u8>> {
    Ok(vec![slot, u8::from(enabled)])
}

fn start_index(index: &u32) -> Result<Vec<u8>> {
    Ok(index.to_le_bytes().to_vec())
}

/// The bootloader expects the image length first, then its CRC.
fn update_info(&(length, checksum): &(u32, u32)) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(8);
    payload.extend_from_slice(&length.to_le_bytes());
    payload.extend_from_slice(&checksum.to_le_bytes());
    Ok(payload)
}

fn rgb565_frame(colors: &[u32]) -> Result<Vec<u8>> {
    Ok(colors
        .iter()
        .flat_map(|&rgb| rgb_to_rgb565(rgb).to_le_bytes())
        .collect())
}

// Decoders

fn no_response(payload: Bytes) -> Result<()> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(McuLinkError::InvalidResponse(format!(
            "unexpected {} byte payload",
            payload.len()
        )))
    }
}

fn raw_response(payload: Bytes) -> Result<Bytes> {
    Ok(payload)
}

fn single_byte(payload: Bytes) -> Result<u8> {
    match payload[..] {
        [value] => Ok(value),
        _ => Err(McuLinkError::InvalidResponse(format!(
            "expected 1 byte, got {}",
            payload.len()
        ))),
    }
}

fn u32_le(payload: Bytes) -> Result<u32> {
    let bytes: [u8; 4] = payload[..].try_into().map_err(|_| {
        McuLinkError::InvalidResponse(format!("expected 4 bytes, got {}", payload.len()))
    })?;
    Ok(u32::from_le_bytes(bytes))
}

fn version(payload: Bytes) -> Result<Option<Version>> {
    Ok(std::str::from_utf8(&payload)
        .ok()
        .and_then(|text| text.parse().ok()))
}

fn operation_mode(payload: Bytes) -> Result<OperationMode> {
    let value = single_byte(payload)?;
    OperationMode::try_from(value)
        .map_err(|v| McuLinkError::InvalidResponse(format!("unknown operation mode {v:#04x}")))
}

fn string_list(payload: Bytes) -> Result<HashMap<String, u8>> {
    parse_string_list(&payload)
}

fn error_records(payload: Bytes) -> Result<Vec<Bytes>> {
    Ok((0..payload.len())
        .step_by(ERROR_RECORD_SIZE)
        .map(|start| payload.slice(start..(start + ERROR_RECORD_SIZE).min(payload.len())))
        .collect())
}

/// Parse a `[key][len][name]...` list into a name to key map.
///
/// ```
/// use mcu_link::command::parse_string_list;
///
/// let types = parse_string_list(b"\x01\x06foobar\x02\x03baz").unwrap();
/// assert_eq!(types["foobar"], 1);
/// assert_eq!(types["baz"], 2);
/// ```
pub fn parse_string_list(data: &[u8]) -> Result<HashMap<String, u8>> {
    let mut entries = HashMap::new();
    let mut rest = data;

    while let [key, length, tail @ ..] = rest {
        let length = *length as usize;
        if tail.len() < length {
            return Err(McuLinkError::InvalidResponse(format!(
                "string list entry {key} truncated"
            )));
        }
        let (name, next) = tail.split_at(length);
        let name = std::str::from_utf8(name)
            .map_err(|e| McuLinkError::InvalidResponse(format!("string list entry {key}: {e}")))?;
        entries.insert(name.to_string(), *key);
        rest = next;
    }

    if !rest.is_empty() {
        return Err(McuLinkError::InvalidResponse(
            "string list has a dangling byte".to_string(),
        ));
    }
    Ok(entries)
}

/// Convert a 24-bit `0xRRGGBB` color to RGB565.
#[inline]
pub fn rgb_to_rgb565(rgb: u32) -> u16 {
    let r = (rgb & 0x00F8_0000) >> 8;
    let g = (rgb & 0x0000_FC00) >> 5;
    let b = (rgb & 0x0000_00F8) >> 3;
    (r | g | b) as u16
}
