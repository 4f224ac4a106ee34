use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace};

use crate::calibration::CalibrationProvider;
use crate::gate::AckGate;
use crate::proto::codec::{decode_control, encode_coords};
use crate::proto::command::ControlSignal;
use crate::stats::LinkStats;
use crate::transport::{ByteReader, ByteWriter};

/// Everything the background reader needs; moved into its thread.
pub(crate) struct ReaderLoop<P> {
    pub reader: ByteReader,
    pub writer: Arc<ByteWriter>,
    pub gate: Arc<AckGate>,
    pub provider: Arc<P>,
    pub stats: Arc<LinkStats>,
    pub shutdown: Arc<AtomicBool>,
}

impl<P: CalibrationProvider + 'static> ReaderLoop<P> {
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("keymouse-reader".into())
            .spawn(move || self.run())
    }

    /// Runs until shutdown or the first transport error. Errors fault the
    /// gate so blocked and future callers see them.
    pub fn run(mut self) {
        debug!("reader loop started");
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            match self.reader.read_byte() {
                Ok(None) => continue, // poll timeout
                Ok(Some(byte)) => {
                    self.stats.add_bytes_in(1);
                    if let Err(e) = self.dispatch(byte) {
                        if !self.shutdown.load(Ordering::Acquire) {
                            error!("calibration reply failed: {e}");
                            self.gate.fault(format!("write: {e}"));
                        }
                        break;
                    }
                }
                Err(e) => {
                    if !self.shutdown.load(Ordering::Acquire) {
                        error!("serial read failed: {e}");
                        self.gate.fault(format!("read: {e}"));
                    }
                    break;
                }
            }
        }
        debug!("reader loop stopped");
    }

    fn dispatch(&self, byte: u8) -> io::Result<()> {
        match decode_control(byte) {
            Some(ControlSignal::ScreenCalibrationRequest) => {
                let (w, h) = self.provider.screen_size();
                debug!(w, h, "screen calibration");
                self.reply(&encode_coords(w, h))?;
                self.stats.inc_screen_calibrations();
            }
            Some(ControlSignal::MouseCalibrationRequest) => {
                let (x, y) = self.provider.pointer_position();
                debug!(x, y, "mouse calibration");
                self.reply(&encode_coords(x, y))?;
                self.stats.inc_mouse_calibrations();
            }
            Some(ControlSignal::CommandComplete) => {
                trace!("command complete");
                self.stats.inc_completions();
                self.gate.signal();
            }
            None => {
                // firmware debug output or line noise
                trace!("ignoring byte 0x{byte:02X}");
                self.stats.inc_ignored();
            }
        }
        Ok(())
    }

    fn reply(&self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_bytes(bytes)?;
        self.stats.add_bytes_out(bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::FixedCalibration;
    use crate::error::DeviceError;
    use crate::transport::{DeviceEnd, pipe};
    use std::time::Duration;

    const POLL: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(2);

    struct Harness {
        dev: DeviceEnd,
        gate: Arc<AckGate>,
        stats: Arc<LinkStats>,
        shutdown: Arc<AtomicBool>,
        handle: JoinHandle<()>,
    }

    fn start() -> Harness {
        let (transport, dev) = pipe(POLL);
        let (reader, writer) = transport.split();
        let gate = Arc::new(AckGate::new());
        let stats = Arc::new(LinkStats::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = ReaderLoop {
            reader,
            writer: Arc::new(writer),
            gate: gate.clone(),
            provider: Arc::new(FixedCalibration::new((2560, 1440), (0x0102, 7))),
            stats: stats.clone(),
            shutdown: shutdown.clone(),
        }
        .spawn()
        .unwrap();
        Harness {
            dev,
            gate,
            stats,
            shutdown,
            handle,
        }
    }

    #[test]
    fn screen_calibration_replies_with_le_dimensions() {
        let h = start();
        h.dev.send(&[0xFF]);
        let reply = h.dev.recv_exact(4, WAIT).unwrap();
        assert_eq!(reply, vec![0x00, 0x0A, 0xA0, 0x05]);
        h.shutdown.store(true, Ordering::Release);
        h.handle.join().unwrap();
        assert_eq!(h.stats.snapshot().screen_calibrations, 1);
    }

    #[test]
    fn mouse_calibration_replies_with_pointer() {
        let h = start();
        h.dev.send(&[0xE1]);
        assert_eq!(h.dev.recv_exact(4, WAIT).unwrap(), vec![0x02, 0x01, 7, 0]);
        h.shutdown.store(true, Ordering::Release);
        h.handle.join().unwrap();
    }

    #[test]
    fn completion_signals_gate_and_noise_is_skipped() {
        let h = start();
        h.dev.send(&[b'x', 0x00, 0xE0, 0xFE]);
        h.gate.wait(Some(WAIT)).unwrap();
        h.shutdown.store(true, Ordering::Release);
        h.handle.join().unwrap();
        let s = h.stats.snapshot();
        assert_eq!(s.ignored, 3);
        assert_eq!(s.completions, 1);
        assert_eq!(s.bytes_in, 4);
    }

    #[test]
    fn end_of_stream_faults_gate() {
        let mut h = start();
        h.dev.hang_up();
        h.handle.join().unwrap();
        assert!(matches!(h.gate.wait(None), Err(DeviceError::TransportFault(_))));
    }

    #[test]
    fn shutdown_stops_without_fault() {
        let h = start();
        h.shutdown.store(true, Ordering::Release);
        h.handle.join().unwrap();
        assert!(h.gate.check().is_ok());
    }
}
