//! The public device API.
//!
//! Every operation validates its arguments, writes one command and then
//! blocks until the device reports completion. Only one command is on the
//! wire at a time: concurrent callers queue on an internal lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationProvider;
use crate::error::{DeviceError, DeviceResult};
use crate::gate::AckGate;
use crate::port::{detect_port, open_port};
use crate::proto::codec::encode_command;
use crate::proto::command::{
    Command, KeyCode, KeyboardCommand, MouseButton, MouseCommand, Text, TypingProfile,
};
use crate::reader::ReaderLoop;
use crate::stats::{LinkStats, StatsSnapshot};
use crate::transport::{ByteWriter, Transport};

pub const DEFAULT_BAUD: u32 = 115_200;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Serial device; detected from USB descriptors when `None`.
    pub port: Option<String>,
    /// Must match the firmware.
    pub baud: u32,
    pub rtscts: bool,
    /// Upper bound on one blocking read, which is also how long `close`
    /// may wait for the reader thread.
    pub read_poll: Duration,
    /// `None` waits for completion forever.
    pub ack_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: DEFAULT_BAUD,
            rtscts: false,
            read_poll: Duration::from_millis(100),
            ack_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// A key, button or text argument, checked per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Button(MouseButton),
    Code(i64),
    Text(String),
}

impl From<MouseButton> for Input {
    fn from(b: MouseButton) -> Self {
        Input::Button(b)
    }
}
impl From<KeyCode> for Input {
    fn from(k: KeyCode) -> Self {
        Input::Code(k.code().into())
    }
}
impl From<char> for Input {
    fn from(c: char) -> Self {
        Input::Text(c.to_string())
    }
}
impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Text(s.to_string())
    }
}
impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::Text(s)
    }
}

macro_rules! input_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Input {
            fn from(v: $t) -> Self {
                Input::Code(v.into())
            }
        }
    )*};
}
input_from_int!(u8, u16, u32, i8, i16, i32, i64);

enum Target {
    Mouse(MouseButton),
    Key(KeyCode),
}

pub struct Session<P: CalibrationProvider + 'static> {
    writer: Arc<ByteWriter>,
    gate: Arc<AckGate>,
    provider: Arc<P>,
    stats: Arc<LinkStats>,
    shutdown: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    in_flight: Mutex<()>,
    ack_timeout: Mutex<Option<Duration>>,
}

impl<P: CalibrationProvider + 'static> Session<P> {
    /// Opens the serial port from `config` (detecting it if unset) and
    /// starts the reader loop.
    pub fn open(config: &SessionConfig, provider: P) -> DeviceResult<Self> {
        let dev = match &config.port {
            Some(p) => p.clone(),
            None => detect_port()?,
        };
        let transport = open_port(&dev, config.baud, config.rtscts, config.read_poll)?;
        Self::with_transport(transport, provider, config.ack_timeout)
    }

    /// Runs a session over an already-open transport.
    pub fn with_transport(
        transport: Transport,
        provider: P,
        ack_timeout: Option<Duration>,
    ) -> DeviceResult<Self> {
        let (reader, writer) = transport.split();
        let writer = Arc::new(writer);
        let gate = Arc::new(AckGate::new());
        let provider = Arc::new(provider);
        let stats = Arc::new(LinkStats::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = ReaderLoop {
            reader,
            writer: writer.clone(),
            gate: gate.clone(),
            provider: provider.clone(),
            stats: stats.clone(),
            shutdown: shutdown.clone(),
        }
        .spawn()
        .map_err(|e| DeviceError::Connection(format!("spawn reader: {e}")))?;

        Ok(Self {
            writer,
            gate,
            provider,
            stats,
            shutdown,
            reader: Mutex::new(Some(handle)),
            in_flight: Mutex::new(()),
            ack_timeout: Mutex::new(ack_timeout),
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        *self.ack_timeout.lock()
    }

    /// Applies from the next command on; a caller already waiting keeps
    /// its deadline.
    pub fn set_ack_timeout(&self, timeout: Option<Duration>) {
        *self.ack_timeout.lock() = timeout;
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /* -------------------- keyboard + mouse -------------------- */

    /// Presses a mouse button or a keyboard key.
    ///
    /// Integer codes equal to a mouse button code press that button; other
    /// codes must be valid key codes. Text must be exactly one ASCII char.
    pub fn press(&self, input: impl Into<Input>) -> DeviceResult<()> {
        let cmd: Command = match key_or_button(input.into())? {
            Target::Mouse(b) => MouseCommand::Press(b).into(),
            Target::Key(k) => KeyboardCommand::Press(k).into(),
        };
        self.send(&cmd)
    }

    pub fn release(&self, input: impl Into<Input>) -> DeviceResult<()> {
        let cmd: Command = match key_or_button(input.into())? {
            Target::Mouse(b) => MouseCommand::Release(b).into(),
            Target::Key(k) => KeyboardCommand::Release(k).into(),
        };
        self.send(&cmd)
    }

    /* -------------------- keyboard -------------------- */

    pub fn release_all(&self) -> DeviceResult<()> {
        self.send(&KeyboardCommand::ReleaseAll.into())
    }

    /// Key codes and single ASCII chars are written as one keystroke and
    /// ignore `endl`. Any other text is printed, with a trailing newline
    /// when `endl` is set.
    pub fn write(&self, input: impl Into<Input>, endl: bool) -> DeviceResult<()> {
        let input: Input = input.into();
        let cmd = match input {
            Input::Code(c) => KeyboardCommand::Write(
                KeyCode::new(c)
                    .ok_or_else(|| DeviceError::invalid(format!("not a key code: {c:#x}")))?,
            ),
            Input::Text(s) => match single_char(&s).and_then(KeyCode::from_char) {
                Some(k) => KeyboardCommand::Write(k),
                None if endl => KeyboardCommand::Println(Text::new(&s)?),
                None => KeyboardCommand::Print(Text::new(&s)?),
            },
            Input::Button(b) => {
                return Err(DeviceError::invalid(format!(
                    "{b:?} is a mouse button, not a keystroke"
                )));
            }
        };
        self.send(&cmd.into())
    }

    /// Types `message` with human-like timing and optional mistakes.
    pub fn type_text(&self, message: &str, profile: TypingProfile) -> DeviceResult<()> {
        profile.validate()?;
        let text = Text::new(message)?;
        self.send(&KeyboardCommand::Type { text, profile }.into())
    }

    /* -------------------- mouse -------------------- */

    pub fn click(&self, button: impl Into<Input>) -> DeviceResult<()> {
        let b = mouse_button(button.into())?;
        self.send(&MouseCommand::Click(b).into())
    }

    pub fn fast_click(&self, button: impl Into<Input>) -> DeviceResult<()> {
        let b = mouse_button(button.into())?;
        self.send(&MouseCommand::FastClick(b).into())
    }

    /// Moves the pointer to absolute screen coordinates.
    ///
    /// Fractions are truncated toward zero; both values must then fit
    /// `0..=65535`, otherwise nothing is sent.
    pub fn move_to(&self, x: impl Into<f64>, y: impl Into<f64>) -> DeviceResult<()> {
        let (x, y) = (coord("x", x.into())?, coord("y", y.into())?);
        self.send(&MouseCommand::Move { x, y }.into())
    }

    /// Like [`Session::move_to`] but along a curved, human-looking path.
    pub fn bezier_move(&self, x: impl Into<f64>, y: impl Into<f64>) -> DeviceResult<()> {
        let (x, y) = (coord("x", x.into())?, coord("y", y.into())?);
        self.send(&MouseCommand::Bezier { x, y }.into())
    }

    /* -------------------- wire -------------------- */

    /// Writes one command and blocks until the device completes it.
    pub fn send(&self, cmd: &Command) -> DeviceResult<()> {
        let _in_flight = self.in_flight.lock();
        self.gate.check()?;
        // completions seen before this point belong to no-one
        self.gate.arm();

        let bytes = encode_command(cmd);
        debug!(cmd = cmd.name(), "-> {:02X?}", bytes);
        if let Err(e) = self.writer.write_bytes(&bytes) {
            if self.is_closed() {
                return Err(DeviceError::SessionClosed);
            }
            warn!("serial write failed: {e}");
            let reason = format!("write: {e}");
            self.gate.fault(reason.clone());
            return Err(DeviceError::TransportFault(reason));
        }
        self.stats.inc_commands();
        self.stats.add_bytes_out(bytes.len());

        match self.gate.wait(self.ack_timeout()) {
            Err(DeviceError::Timeout(d)) => {
                warn!(cmd = cmd.name(), "no completion within {d:?}");
                Err(DeviceError::Timeout(d))
            }
            other => other,
        }
    }

    /// Stops the reader loop and releases the port. Blocked callers get
    /// [`DeviceError::SessionClosed`]; later calls fail the same way.
    pub fn close(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.gate.close();
        self.writer.close();
        let handle = self.reader.lock().take();
        if let Some(h) = handle
            && h.join().is_err()
        {
            warn!("reader thread panicked");
        }
        self.stats.log();
        info!("session closed");
    }
}

impl<P: CalibrationProvider + 'static> Drop for Session<P> {
    fn drop(&mut self) {
        self.close();
    }
}

/* -------------------- argument checks -------------------- */

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn key_or_button(input: Input) -> DeviceResult<Target> {
    match input {
        Input::Button(b) => Ok(Target::Mouse(b)),
        Input::Code(c) => {
            if let Ok(byte) = u8::try_from(c)
                && let Some(b) = MouseButton::from_code(byte)
            {
                return Ok(Target::Mouse(b));
            }
            KeyCode::new(c)
                .map(Target::Key)
                .ok_or_else(|| DeviceError::invalid(format!("not a key or button code: {c:#x}")))
        }
        Input::Text(s) => single_char(&s)
            .and_then(KeyCode::from_char)
            .map(Target::Key)
            .ok_or_else(|| DeviceError::invalid(format!("not a single ASCII key: {s:?}"))),
    }
}

fn mouse_button(input: Input) -> DeviceResult<MouseButton> {
    match input {
        Input::Button(b) => Ok(b),
        Input::Code(c) => u8::try_from(c)
            .ok()
            .and_then(MouseButton::from_code)
            .ok_or_else(|| DeviceError::invalid(format!("not a mouse button: {c:#x}"))),
        Input::Text(s) => Err(DeviceError::invalid(format!("not a mouse button: {s:?}"))),
    }
}

fn coord(axis: &str, v: f64) -> DeviceResult<u16> {
    let t = v.trunc();
    if !t.is_finite() || !(0.0..=f64::from(u16::MAX)).contains(&t) {
        return Err(DeviceError::invalid(format!(
            "{axis} coordinate {v} outside 0..=65535"
        )));
    }
    Ok(t as u16)
}
