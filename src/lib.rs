//! Host-side driver for a serial-attached keyboard/mouse emulator.
//!
//! The microcontroller on the other end of the serial link turns commands
//! into real USB HID events. It talks back with single control bytes: a
//! completion acknowledgement after each command, and calibration requests
//! for the host's screen size and pointer position.
//!
//! ```no_run
//! use keymouse::{FixedCalibration, MouseButton, Session, SessionConfig};
//!
//! let config = SessionConfig {
//!     port: Some("/dev/ttyACM0".into()),
//!     ..Default::default()
//! };
//! let session = Session::open(&config, FixedCalibration::single_1080p())?;
//! session.move_to(400, 300)?;
//! session.click(MouseButton::Left)?;
//! session.write("hello", true)?;
//! session.close();
//! # Ok::<(), keymouse::DeviceError>(())
//! ```

pub mod calibration;
pub mod error;
pub mod gate;
pub mod port;
pub mod proto;
mod reader;
pub mod session;
pub mod stats;
pub mod transport;

pub use calibration::{CalibrationProvider, FixedCalibration};
pub use error::{DeviceError, DeviceResult};
pub use proto::command::{Command, ControlSignal, KeyCode, MouseButton, Text, TypingProfile};
pub use session::{Input, Session, SessionConfig};
pub use stats::StatsSnapshot;
