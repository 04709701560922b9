//! Reader for the MCU's persistent error memory.

use bytes::Bytes;

use crate::command::{ApplicationControl, ERROR_RECORD_SIZE};
use crate::error::Result;

/// Reads, pages through and clears stored MCU errors.
///
/// Each record is [`ERROR_RECORD_SIZE`] bytes of raw error data.
#[derive(Clone)]
pub struct McuErrorReader {
    control: ApplicationControl,
    count: u32,
}

impl McuErrorReader {
    /// Create a reader and fetch the current error count.
    pub fn new(control: ApplicationControl) -> Result<Self> {
        let count = control.error_memory_read_count()?;
        tracing::info!(count, "stored MCU errors");
        Ok(Self { control, count })
    }

    /// Error count as of the last update.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Refresh the error count.
    pub fn update(&mut self) -> Result<u32> {
        self.count = self.control.error_memory_read_count()?;
        Ok(self.count)
    }

    /// Read every stored record, one page at a time.
    ///
    /// Stops early if the MCU returns an empty page.
    pub fn read_all(&self) -> Result<Vec<Bytes>> {
        let mut records = Vec::with_capacity(self.count as usize);
        let mut remaining = self.count;
        let mut next_index = 0u32;

        while remaining > 0 {
            let page = self.control.error_memory_read_errors(next_index)?;
            if page.is_empty() {
                tracing::debug!(next_index, "no errors returned");
                break;
            }

            let read = u32::try_from(page.len()).unwrap_or(u32::MAX);
            remaining = remaining.saturating_sub(read);
            next_index = next_index.saturating_add(read);
            tracing::debug!(read, remaining, "error page read");
            records.extend(page);
        }

        Ok(records)
    }

    /// Clear the error memory and refresh the count.
    pub fn clear(&mut self) -> Result<u32> {
        tracing::info!("clearing MCU error memory");
        self.control.error_memory_clear()?;
        let count = self.update()?;
        tracing::info!(count, "error memory cleared");
        Ok(count)
    }

    /// Make the MCU record a test error and refresh the count.
    pub fn record_test_error(&mut self) -> Result<u32> {
        self.control.error_memory_test()?;
        self.update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseStatus;
    use crate::transport::{CommandLink, Response};
    use std::sync::{Arc, Mutex};

    /// Error memory holding `records` records, at most `page` per read.
    struct FakeErrorMemory {
        records: Mutex<Vec<[u8; ERROR_RECORD_SIZE]>>,
        page: usize,
        reads: Mutex<Vec<u32>>,
    }

    impl FakeErrorMemory {
        fn new(count: u8, page: usize) -> Self {
            Self {
                records: Mutex::new((0..count).map(|i| [i; ERROR_RECORD_SIZE]).collect()),
                page,
                reads: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandLink for FakeErrorMemory {
        fn send_command(&self, command_id: u8, payload: &[u8]) -> Result<Response> {
            let mut records = self.records.lock().unwrap();
            let payload = match command_id {
                0x3D => (records.len() as u32).to_le_bytes().to_vec(),
                0x3E => {
                    let start = u32::from_le_bytes(payload.try_into().unwrap());
                    self.reads.lock().unwrap().push(start);
                    records
                        .iter()
                        .skip(start as usize)
                        .take(self.page)
                        .flatten()
                        .copied()
                        .collect()
                }
                0x3F => {
                    records.clear();
                    Vec::new()
                }
                0x40 => {
                    records.push([0xEE; ERROR_RECORD_SIZE]);
                    Vec::new()
                }
                _ => Vec::new(),
            };
            Ok(Response::new(ResponseStatus::Ok, Bytes::from(payload)))
        }
    }

    #[test]
    fn test_read_all_pages() {
        let memory = Arc::new(FakeErrorMemory::new(5, 2));
        let reader = McuErrorReader::new(ApplicationControl::new(memory.clone())).unwrap();
        assert_eq!(reader.count(), 5);

        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[3][0], 3);
        assert_eq!(*memory.reads.lock().unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn test_read_all_stops_on_empty_page() {
        let memory = Arc::new(FakeErrorMemory::new(2, 4));
        let mut reader = McuErrorReader::new(ApplicationControl::new(memory.clone())).unwrap();
        reader.count = 6;

        assert_eq!(reader.read_all().unwrap().len(), 2);
        assert_eq!(*memory.reads.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_clear_and_test_error() {
        let memory = Arc::new(FakeErrorMemory::new(3, 4));
        let mut reader = McuErrorReader::new(ApplicationControl::new(memory)).unwrap();

        assert_eq!(reader.clear().unwrap(), 0);
        assert_eq!(reader.record_test_error().unwrap(), 1);
        assert_eq!(reader.read_all().unwrap()[0][0], 0xEE);
    }
}
