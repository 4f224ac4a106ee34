//! Host-side answers to the device's calibration requests.
//!
//! The device asks for the screen size and the current pointer position so
//! it can turn absolute move targets into relative HID reports. Platform
//! display APIs live outside this crate and plug in through
//! [`CalibrationProvider`].

use parking_lot::Mutex;

pub trait CalibrationProvider: Send + Sync {
    /// `(width, height)` of the primary screen in pixels.
    fn screen_size(&self) -> (u16, u16);

    /// `(x, y)` of the pointer in screen pixels.
    fn pointer_position(&self) -> (u16, u16);
}

impl<P: CalibrationProvider + ?Sized> CalibrationProvider for std::sync::Arc<P> {
    fn screen_size(&self) -> (u16, u16) {
        (**self).screen_size()
    }
    fn pointer_position(&self) -> (u16, u16) {
        (**self).pointer_position()
    }
}

/// Fixed answers, settable at runtime.
///
/// Used by the command-line front end and by tests; no display access.
#[derive(Debug)]
pub struct FixedCalibration {
    screen: (u16, u16),
    pointer: Mutex<(u16, u16)>,
}

impl FixedCalibration {
    pub fn new(screen: (u16, u16), pointer: (u16, u16)) -> Self {
        Self {
            screen,
            pointer: Mutex::new(pointer),
        }
    }

    pub fn single_1080p() -> Self {
        Self::new((1920, 1080), (0, 0))
    }

    pub fn set_pointer(&self, x: u16, y: u16) {
        *self.pointer.lock() = (x, y);
    }
}

impl CalibrationProvider for FixedCalibration {
    fn screen_size(&self) -> (u16, u16) {
        self.screen
    }

    fn pointer_position(&self) -> (u16, u16) {
        *self.pointer.lock()
    }
}
