//! Raw duplex byte channel to the device.
//!
//! The read half is owned by the reader loop; the write half is shared by
//! callers (command bytes) and the reader loop (calibration replies), so its
//! writes are serialized behind a mutex. No framing or retry lives here.

use std::io::{self, ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use parking_lot::Mutex;

pub struct Transport {
    reader: ByteReader,
    writer: ByteWriter,
}

impl Transport {
    pub fn new(reader: impl Read + Send + 'static, writer: impl Write + Send + 'static) -> Self {
        Self {
            reader: ByteReader {
                inner: Box::new(reader),
            },
            writer: ByteWriter {
                inner: Mutex::new(Some(Box::new(writer))),
            },
        }
    }

    pub fn split(self) -> (ByteReader, ByteWriter) {
        (self.reader, self.writer)
    }
}

pub struct ByteReader {
    inner: Box<dyn Read + Send>,
}

impl ByteReader {
    /// Blocks for at most the underlying read timeout.
    ///
    /// `Ok(None)` means no byte arrived yet and the caller should poll again.
    /// End of stream is reported as `UnexpectedEof`.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf) {
            Ok(0) => Err(io::Error::new(ErrorKind::UnexpectedEof, "device stream ended")),
            Ok(_) => Ok(Some(buf[0])),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

pub struct ByteWriter {
    inner: Mutex<Option<Box<dyn Write + Send>>>,
}

impl ByteWriter {
    /// Writes and flushes `bytes` as one uninterrupted sequence.
    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let mut guard = self.inner.lock();
        let w = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "transport closed"))?;
        w.write_all(bytes)?;
        w.flush()
    }

    /// Releases the write handle. Safe to call more than once.
    pub fn close(&self) {
        self.inner.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

/* -------------------- in-memory link -------------------- */

/// Builds a host transport wired to a [`DeviceEnd`] over in-memory channels.
///
/// Host reads time out after `poll`, like a serial port opened with a read
/// timeout.
pub fn pipe(poll: Duration) -> (Transport, DeviceEnd) {
    let (to_device, from_host) = mpsc::channel();
    let (to_host, from_device) = mpsc::channel();
    let transport = Transport::new(
        ChannelReader {
            rx: from_device,
            poll,
        },
        ChannelWriter { tx: to_device },
    );
    let device = DeviceEnd {
        rx: from_host,
        tx: Some(to_host),
    };
    (transport, device)
}

struct ChannelReader {
    rx: Receiver<u8>,
    poll: Duration,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.rx.recv_timeout(self.poll) {
            Ok(b) => {
                buf[0] = b;
                let mut n = 1;
                while n < buf.len() {
                    match self.rx.try_recv() {
                        Ok(b) => {
                            buf[n] = b;
                            n += 1;
                        }
                        Err(_) => break,
                    }
                }
                Ok(n)
            }
            Err(RecvTimeoutError::Timeout) => Err(ErrorKind::TimedOut.into()),
            Err(RecvTimeoutError::Disconnected) => Ok(0),
        }
    }
}

struct ChannelWriter {
    tx: Sender<u8>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &b in buf {
            self.tx
                .send(b)
                .map_err(|_| io::Error::new(ErrorKind::BrokenPipe, "device end dropped"))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Device side of [`pipe`].
pub struct DeviceEnd {
    rx: Receiver<u8>,
    tx: Option<Sender<u8>>,
}

impl DeviceEnd {
    /// Sends bytes to the host. Returns false once the host side is gone.
    pub fn send(&self, bytes: &[u8]) -> bool {
        match &self.tx {
            Some(tx) => bytes.iter().all(|&b| tx.send(b).is_ok()),
            None => false,
        }
    }

    /// Next byte from the host, if one arrives within `timeout`.
    pub fn recv_byte(&self, timeout: Duration) -> Option<u8> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Exactly `n` bytes from the host, each within `timeout`.
    pub fn recv_exact(&self, n: usize, timeout: Duration) -> Option<Vec<u8>> {
        (0..n).map(|_| self.recv_byte(timeout)).collect()
    }

    /// Everything the host has written so far.
    pub fn drain(&self) -> Vec<u8> {
        self.rx.try_iter().collect()
    }

    /// Ends the device-to-host stream; the host then reads end-of-stream.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(20);

    #[test]
    fn read_byte_polls_then_delivers() {
        let (t, dev) = pipe(POLL);
        let (mut r, _w) = t.split();
        assert!(matches!(r.read_byte(), Ok(None)));
        assert!(dev.send(&[0xFE]));
        assert_eq!(r.read_byte().unwrap(), Some(0xFE));
    }

    #[test]
    fn hang_up_reads_as_eof() {
        let (t, mut dev) = pipe(POLL);
        let (mut r, _w) = t.split();
        dev.hang_up();
        let err = r.read_byte().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn close_is_idempotent_and_blocks_writes() {
        let (t, dev) = pipe(POLL);
        let (_r, w) = t.split();
        w.write_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(dev.drain(), vec![1, 2, 3]);
        w.close();
        w.close();
        assert!(w.is_closed());
        let err = w.write_bytes(&[4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn write_to_dropped_device_is_broken_pipe() {
        let (t, dev) = pipe(POLL);
        let (_r, w) = t.split();
        drop(dev);
        let err = w.write_bytes(&[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }
}
