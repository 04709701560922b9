//! Raw byte channel to a single MCU bus address.
//!
//! The link transport only needs "write these bytes" and "read exactly this
//! many bytes". Bus drivers implement [`ByteChannel`]; anything that is
//! `std::io::Read + Write` (a `/dev/i2c-N` handle with the slave address
//! already selected, a serial bridge, a socket to a simulator) can be wrapped
//! in an [`IoChannel`].

use std::io::{self, Read, Write};

/// Half-duplex byte channel.
///
/// Reads on an I2C bus are non-destructive: reading again returns the
/// response from its first byte. The link transport relies on this when it
/// re-reads a header together with its payload.
pub trait ByteChannel: Send {
    /// Read exactly `len` bytes.
    fn read(&mut self, len: usize) -> io::Result<Vec<u8>>;

    /// Write all of `data` as one transaction.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;
}

impl<T: ByteChannel + ?Sized> ByteChannel for Box<T> {
    fn read(&mut self, len: usize) -> io::Result<Vec<u8>> {
        (**self).read(len)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }
}

/// Adapter from `std::io` streams to [`ByteChannel`].
#[derive(Debug)]
pub struct IoChannel<T> {
    inner: T,
}

impl<T> IoChannel<T> {
    /// Wrap a stream.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write + Send> ByteChannel for IoChannel<T> {
    fn read(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)?;
        self.inner.flush()
    }
}
