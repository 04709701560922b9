//! Batched status reads from the MCU.
//!
//! The MCU collects data from every enabled slot and returns it in one
//! response, which keeps bus traffic low for frequently polled values.
//! [`McuStatusUpdater`] enables slots and routes each slot's data to its
//! handler.

use std::fmt;

use crate::command::ApplicationControl;
use crate::error::{McuLinkError, Result};

/// Number of slots the MCU status updater supports.
pub const SLOT_COUNT: usize = 32;

/// Named status slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusSlot {
    Motor1 = 0,
    Motor2 = 1,
    Motor3 = 2,
    Motor4 = 3,
    Motor5 = 4,
    Motor6 = 5,
    Sensor1 = 6,
    Sensor2 = 7,
    Sensor3 = 8,
    Sensor4 = 9,
    Battery = 10,
    Accelerometer = 11,
    Gyro = 12,
    Yaw = 13,
    /// Reset notification. Always enabled on the MCU side.
    Reset = 14,
}

impl StatusSlot {
    /// Slot of motor port `port` (1-based).
    pub fn motor(port: u8) -> Option<Self> {
        match port {
            1 => Some(StatusSlot::Motor1),
            2 => Some(StatusSlot::Motor2),
            3 => Some(StatusSlot::Motor3),
            4 => Some(StatusSlot::Motor4),
            5 => Some(StatusSlot::Motor5),
            6 => Some(StatusSlot::Motor6),
            _ => None,
        }
    }

    /// Slot of sensor port `port` (1-based).
    pub fn sensor(port: u8) -> Option<Self> {
        match port {
            1 => Some(StatusSlot::Sensor1),
            2 => Some(StatusSlot::Sensor2),
            3 => Some(StatusSlot::Sensor3),
            4 => Some(StatusSlot::Sensor4),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Handler receiving the raw data of one slot.
pub type SlotHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Enables status slots and dispatches the batched slot stream.
pub struct McuStatusUpdater {
    control: ApplicationControl,
    enabled: [bool; SLOT_COUNT],
    handlers: Vec<Option<SlotHandler>>,
}

impl McuStatusUpdater {
    pub fn new(control: ApplicationControl) -> Self {
        Self {
            control,
            enabled: initial_slots(),
            handlers: empty_handlers(),
        }
    }

    pub fn is_enabled(&self, slot: StatusSlot) -> bool {
        self.enabled[slot.index()]
    }

    /// Disable every slot and drop all handlers, locally and on the MCU.
    pub fn reset(&mut self) -> Result<()> {
        tracing::debug!("reset all status slots");
        self.enabled = initial_slots();
        self.handlers = empty_handlers();
        self.control.status_updater_reset()
    }

    /// Enable `slot` and route its data to `handler`.
    ///
    /// The MCU is only contacted if the slot was disabled; otherwise just
    /// the handler is replaced.
    pub fn enable_slot<F>(&mut self, slot: StatusSlot, handler: F) -> Result<()>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let idx = slot.index();
        if !self.enabled[idx] {
            tracing::debug!(slot = idx, "enable status slot");
            self.control.status_updater_control(slot as u8, true)?;
            self.enabled[idx] = true;
        }
        self.handlers[idx] = Some(Box::new(handler));
        Ok(())
    }

    /// Disable `slot` and drop its handler.
    pub fn disable_slot(&mut self, slot: StatusSlot) -> Result<()> {
        let idx = slot.index();
        if self.enabled[idx] {
            tracing::debug!(slot = idx, "disable status slot");
            self.control.status_updater_control(slot as u8, false)?;
            self.enabled[idx] = false;
        }
        self.handlers[idx] = None;
        Ok(())
    }

    /// Read the slot stream and call the handler of every slot present.
    ///
    /// Slots without a handler are skipped.
    pub fn read(&mut self) -> Result<()> {
        let data = self.control.status_updater_read()?;
        for (slot, slot_data) in SlotIter::new(&data) {
            let slot = slot?;
            if let Some(Some(handler)) = self.handlers.get_mut(usize::from(slot)) {
                handler(slot_data);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for McuStatusUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled: Vec<usize> = (0..SLOT_COUNT).filter(|&i| self.enabled[i]).collect();
        f.debug_struct("McuStatusUpdater")
            .field("enabled", &enabled)
            .finish()
    }
}

fn initial_slots() -> [bool; SLOT_COUNT] {
    let mut enabled = [false; SLOT_COUNT];
    enabled[StatusSlot::Reset.index()] = true;
    enabled
}

fn empty_handlers() -> Vec<Option<SlotHandler>> {
    (0..SLOT_COUNT).map(|_| None).collect()
}

/// Iterator over `[slot][len][data]...` records.
///
/// A truncated record yields an error and ends the iteration.
struct SlotIter<'a> {
    data: &'a [u8],
}

impl<'a> SlotIter<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for SlotIter<'a> {
    type Item = (Result<u8>, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (slot, len, rest) = match self.data {
            [] => return None,
            [slot, len, rest @ ..] => (*slot, usize::from(*len), rest),
            [_] => {
                self.data = &[];
                return Some((
                    Err(McuLinkError::InvalidResponse(
                        "status slot record without length".into(),
                    )),
                    &[],
                ));
            }
        };

        if rest.len() < len {
            self.data = &[];
            return Some((
                Err(McuLinkError::InvalidResponse(format!(
                    "status slot {slot}: expected {len} bytes, received {}",
                    rest.len()
                ))),
                &[],
            ));
        }

        let (slot_data, remaining) = rest.split_at(len);
        self.data = remaining;
        Some((Ok(slot), slot_data))
    }
}
