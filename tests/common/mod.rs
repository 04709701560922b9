//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use mcu_link::command::{McuInterfaces, OperationMode};
use mcu_link::protocol::{CommandFrame, Operation, ResponseFrame, ResponseStatus};
use mcu_link::transport::{ByteChannel, CommandLink, Response};
use mcu_link::{McuLinkError, Result};

/// Response behaviour of a [`SimulatedMcu`].
pub type Responder = Box<dyn FnMut(u8, &[u8]) -> (ResponseStatus, Vec<u8>) + Send>;

#[derive(Default)]
pub struct SimulatedState {
    /// Statuses answered before the real response, one per header read.
    pub busy_reads: u32,
    /// GetResult polls answered with Pending before the real response.
    pub pending_polls: u32,
    /// Every decoded frame the controller wrote.
    pub frames: Vec<CommandFrame>,
    /// Header reads the controller made.
    pub header_reads: u32,
    response: Vec<u8>,
    queued: VecDeque<ResponseStatus>,
}

/// A responder speaking the wire protocol on a byte channel.
///
/// Cloning shares the state, so a test can keep one handle while the
/// transport owns the other.
#[derive(Clone)]
pub struct SimulatedMcu {
    state: Arc<Mutex<SimulatedState>>,
    responder: Arc<Mutex<Responder>>,
}

impl SimulatedMcu {
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(u8, &[u8]) -> (ResponseStatus, Vec<u8>) + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(SimulatedState::default())),
            responder: Arc::new(Mutex::new(Box::new(responder))),
        }
    }

    /// Responder echoing the payload back with status Ok.
    pub fn echo() -> Self {
        Self::new(|_, payload| (ResponseStatus::Ok, payload.to_vec()))
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap()
    }
}

impl ByteChannel for SimulatedMcu {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let frame = CommandFrame::decode(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let mut state = self.state.lock().unwrap();
        for _ in 0..state.busy_reads {
            state.queued.push_back(ResponseStatus::Busy);
        }

        match frame.operation {
            Operation::Start => {
                if state.pending_polls > 0 {
                    state.queued.push_back(ResponseStatus::Pending);
                    state.pending_polls -= 1;
                }
                let (status, payload) = (self.responder.lock().unwrap())(frame.command_id, frame.payload());
                state.response = ResponseFrame::encode(status, &payload)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
            }
            Operation::GetResult => {
                if state.pending_polls > 0 {
                    state.queued.push_back(ResponseStatus::Pending);
                    state.pending_polls -= 1;
                }
            }
            _ => {}
        }

        state.frames.push(frame);
        Ok(())
    }

    fn read(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        if len == mcu_link::protocol::HEADER_SIZE {
            state.header_reads += 1;
            if let Some(status) = state.queued.pop_front() {
                return ResponseFrame::encode(status, &[])
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()));
            }
        }
        Ok(state.response.iter().copied().take(len).collect())
    }
}

/// Commands seen by a [`FakeMcu`], tagged with the interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Application(u8),
    Bootloader(u8),
}

#[derive(Debug)]
pub struct FakeMcuState {
    pub mode: OperationMode,
    pub hardware_version: String,
    pub firmware_version: String,
    pub flashed: Vec<u8>,
    pub update_info: Option<(u32, u32)>,
    pub chunks: Vec<Vec<u8>>,
    pub seen: Vec<Seen>,
    /// The MCU drops off the bus when asked to reboot.
    pub drop_on_reboot: bool,
}

/// An MCU faked at the command level, with an application and a
/// bootloader side. The side that is not running does not answer.
#[derive(Clone)]
pub struct FakeMcu {
    pub state: Arc<Mutex<FakeMcuState>>,
}

impl FakeMcu {
    pub fn new(mode: OperationMode, firmware_version: &str, flashed: &[u8]) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeMcuState {
                mode,
                hardware_version: "1.0.0".to_string(),
                firmware_version: firmware_version.to_string(),
                flashed: flashed.to_vec(),
                update_info: None,
                chunks: Vec::new(),
                seen: Vec::new(),
                drop_on_reboot: true,
            })),
        }
    }

    pub fn interfaces(&self) -> McuInterfaces {
        McuInterfaces::new(
            Arc::new(ApplicationSide(self.clone())),
            Arc::new(BootloaderSide(self.clone())),
        )
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeMcuState> {
        self.state.lock().unwrap()
    }
}

fn nack() -> McuLinkError {
    McuLinkError::Io(io::Error::new(io::ErrorKind::Other, "remote I/O error"))
}

fn ok(payload: impl Into<Bytes>) -> Result<Response> {
    Ok(Response::new(ResponseStatus::Ok, payload.into()))
}

struct ApplicationSide(FakeMcu);

impl CommandLink for ApplicationSide {
    fn send_command(&self, command_id: u8, _payload: &[u8]) -> Result<Response> {
        let mut state = self.0.state();
        if state.mode != OperationMode::Application {
            return Err(nack());
        }
        state.seen.push(Seen::Application(command_id));

        match command_id {
            0x01 => ok(state.hardware_version.clone().into_bytes()),
            0x02 => ok(state.firmware_version.clone().into_bytes()),
            0x06 => ok(vec![OperationMode::Application as u8]),
            0x0B => {
                state.mode = OperationMode::Bootloader;
                if state.drop_on_reboot {
                    Err(nack())
                } else {
                    ok(Bytes::new())
                }
            }
            _ => Ok(Response::new(ResponseStatus::UnknownCommand, Bytes::new())),
        }
    }
}

struct BootloaderSide(FakeMcu);

impl CommandLink for BootloaderSide {
    fn send_command(&self, command_id: u8, payload: &[u8]) -> Result<Response> {
        let mut state = self.0.state();
        if state.mode != OperationMode::Bootloader {
            return Err(nack());
        }
        state.seen.push(Seen::Bootloader(command_id));

        match command_id {
            0x01 => ok(state.hardware_version.clone().into_bytes()),
            0x06 => ok(vec![OperationMode::Bootloader as u8]),
            0x07 => ok(crc32fast::hash(&state.flashed).to_le_bytes().to_vec()),
            0x08 => {
                let length = u32::from_le_bytes(payload[0..4].try_into().unwrap());
                let crc = u32::from_le_bytes(payload[4..8].try_into().unwrap());
                state.update_info = Some((length, crc));
                state.chunks.clear();
                ok(Bytes::new())
            }
            0x09 => {
                state.chunks.push(payload.to_vec());
                ok(Bytes::new())
            }
            0x0A => {
                if state.update_info.is_some() {
                    state.flashed = state.chunks.concat();
                }
                state.mode = OperationMode::Application;
                Err(nack())
            }
            _ => Ok(Response::new(ResponseStatus::UnknownCommand, Bytes::new())),
        }
    }
}
