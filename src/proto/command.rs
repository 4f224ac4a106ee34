use std::fmt;
use std::str::FromStr;

use crate::error::{DeviceError, DeviceResult};

// ---- Command families (host -> device) ----
pub const MOUSE_CMD: u8 = 0xE0;
pub const KEYBOARD_CMD: u8 = 0xF0;

// ---- Mouse sub-opcodes ----
pub const MOUSE_CALIBRATE: u8 = 0xE1;
pub const MOUSE_PRESS: u8 = 0xE2;
pub const MOUSE_RELEASE: u8 = 0xE3;
pub const MOUSE_CLICK: u8 = 0xE4;
pub const MOUSE_FAST_CLICK: u8 = 0xE5;
pub const MOUSE_MOVE: u8 = 0xE6;
pub const MOUSE_BEZIER: u8 = 0xE7;

// ---- Keyboard sub-opcodes ----
pub const KEYBOARD_PRESS: u8 = 0xF1;
pub const KEYBOARD_RELEASE: u8 = 0xF2;
pub const KEYBOARD_RELEASE_ALL: u8 = 0xF3;
pub const KEYBOARD_PRINT: u8 = 0xF4;
pub const KEYBOARD_PRINTLN: u8 = 0xF5;
pub const KEYBOARD_WRITE: u8 = 0xF6;
pub const KEYBOARD_TYPE: u8 = 0xF7;

// ---- Control bytes (device -> host) ----
pub const COMMAND_COMPLETE: u8 = 0xFE;
pub const SCREEN_CALIBRATE: u8 = 0xFF;

/// Terminates every text payload.
pub const TEXT_SENTINEL: u8 = 0x00;

/// Highest byte usable as a keyboard key code.
pub const KEY_CODE_MAX: u8 = 0xDA;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub const ALL: [MouseButton; 3] = [MouseButton::Left, MouseButton::Right, MouseButton::Middle];

    pub const fn code(self) -> u8 {
        match self {
            MouseButton::Left => 0xEA,
            MouseButton::Right => 0xEB,
            MouseButton::Middle => 0xEC,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.code() == code)
    }
}

/// A keyboard key as the device firmware sees it: printable ASCII or one of
/// the modifier/special codes in `0x80..=0xDA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(u8);

impl KeyCode {
    pub const LEFT_CTRL: KeyCode = KeyCode(0x80);
    pub const LEFT_SHIFT: KeyCode = KeyCode(0x81);
    pub const LEFT_ALT: KeyCode = KeyCode(0x82);
    pub const LEFT_GUI: KeyCode = KeyCode(0x83);
    pub const RIGHT_CTRL: KeyCode = KeyCode(0x84);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0x85);
    pub const RIGHT_ALT: KeyCode = KeyCode(0x86);
    pub const RIGHT_GUI: KeyCode = KeyCode(0x87);
    pub const RETURN: KeyCode = KeyCode(0xB0);
    pub const ESC: KeyCode = KeyCode(0xB1);
    pub const BACKSPACE: KeyCode = KeyCode(0xB2);
    pub const TAB: KeyCode = KeyCode(0xB3);
    pub const CAPS_LOCK: KeyCode = KeyCode(0xC1);
    pub const F1: KeyCode = KeyCode(0xC2);
    pub const F2: KeyCode = KeyCode(0xC3);
    pub const F3: KeyCode = KeyCode(0xC4);
    pub const F4: KeyCode = KeyCode(0xC5);
    pub const F5: KeyCode = KeyCode(0xC6);
    pub const F6: KeyCode = KeyCode(0xC7);
    pub const F7: KeyCode = KeyCode(0xC8);
    pub const F8: KeyCode = KeyCode(0xC9);
    pub const F9: KeyCode = KeyCode(0xCA);
    pub const F10: KeyCode = KeyCode(0xCB);
    pub const F11: KeyCode = KeyCode(0xCC);
    pub const F12: KeyCode = KeyCode(0xCD);
    pub const INSERT: KeyCode = KeyCode(0xD1);
    pub const HOME: KeyCode = KeyCode(0xD2);
    pub const PAGE_UP: KeyCode = KeyCode(0xD3);
    pub const DELETE: KeyCode = KeyCode(0xD4);
    pub const END: KeyCode = KeyCode(0xD5);
    pub const PAGE_DOWN: KeyCode = KeyCode(0xD6);
    pub const RIGHT_ARROW: KeyCode = KeyCode(0xD7);
    pub const LEFT_ARROW: KeyCode = KeyCode(0xD8);
    pub const DOWN_ARROW: KeyCode = KeyCode(0xD9);
    pub const UP_ARROW: KeyCode = KeyCode(0xDA);

    /// Accepts `0x01..=0xDA`; `0x00` is the text sentinel and everything
    /// above collides with command, button or control bytes.
    pub fn new(code: i64) -> Option<Self> {
        u8::try_from(code)
            .ok()
            .filter(|c| (1..=KEY_CODE_MAX).contains(c))
            .map(KeyCode)
    }

    pub fn from_char(c: char) -> Option<Self> {
        if c.is_ascii() && c != '\0' {
            Some(KeyCode(c as u8))
        } else {
            None
        }
    }

    pub const fn code(self) -> u8 {
        self.0
    }
}

/// Text accepted by the print/println/type commands.
///
/// Every char is sent as one byte and the payload is NUL-terminated on the
/// wire, so only `U+0001..=U+00FF` can be carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(String);

impl Text {
    pub fn new(s: &str) -> DeviceResult<Self> {
        if let Some(bad) = s.chars().find(|&c| c == '\0' || (c as u32) > 0xFF) {
            return Err(DeviceError::invalid(format!(
                "text cannot carry {:?} (U+{:04X}); payload is NUL-terminated single bytes",
                bad, bad as u32
            )));
        }
        Ok(Text(s.to_string()))
    }

    /// Reads a wire payload one char per byte, stopping at the first NUL.
    pub(crate) fn from_payload(bytes: &[u8]) -> Self {
        Text(
            bytes
                .iter()
                .take_while(|&&b| b != TEXT_SENTINEL)
                .map(|&b| char::from(b))
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        // every char was checked to fit a byte
        self.0.chars().map(|c| c as u32 as u8)
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of the simulated human-typing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingProfile {
    pub wpm: u8,
    pub mistakes: bool,
    pub accuracy: u8,
}

impl Default for TypingProfile {
    fn default() -> Self {
        Self {
            wpm: 80,
            mistakes: true,
            accuracy: 96,
        }
    }
}

impl TypingProfile {
    pub fn new(wpm: u32, mistakes: bool, accuracy: u32) -> DeviceResult<Self> {
        if !(1..=255).contains(&wpm) {
            return Err(DeviceError::invalid(format!(
                "wpm must satisfy 1 <= wpm <= 255, got {wpm}"
            )));
        }
        if !(1..=100).contains(&accuracy) {
            return Err(DeviceError::invalid(format!(
                "accuracy must satisfy 1 <= accuracy <= 100, got {accuracy}"
            )));
        }
        Ok(Self {
            wpm: wpm as u8,
            mistakes,
            accuracy: accuracy as u8,
        })
    }

    pub fn validate(&self) -> DeviceResult<()> {
        Self::new(self.wpm.into(), self.mistakes, self.accuracy.into()).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MouseCommand {
    Press(MouseButton),
    Release(MouseButton),
    Click(MouseButton),
    FastClick(MouseButton),
    Move { x: u16, y: u16 },
    Bezier { x: u16, y: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardCommand {
    Press(KeyCode),
    Release(KeyCode),
    ReleaseAll,
    Print(Text),
    Println(Text),
    Write(KeyCode),
    Type { text: Text, profile: TypingProfile },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mouse(MouseCommand),
    Keyboard(KeyboardCommand),
}

impl Command {
    /// Short tag used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Mouse(m) => match m {
                MouseCommand::Press(_) => "mouse press",
                MouseCommand::Release(_) => "mouse release",
                MouseCommand::Click(_) => "mouse click",
                MouseCommand::FastClick(_) => "mouse fast-click",
                MouseCommand::Move { .. } => "mouse move",
                MouseCommand::Bezier { .. } => "mouse bezier",
            },
            Command::Keyboard(k) => match k {
                KeyboardCommand::Press(_) => "key press",
                KeyboardCommand::Release(_) => "key release",
                KeyboardCommand::ReleaseAll => "key release-all",
                KeyboardCommand::Print(_) => "key print",
                KeyboardCommand::Println(_) => "key println",
                KeyboardCommand::Write(_) => "key write",
                KeyboardCommand::Type { .. } => "key type",
            },
        }
    }
}

impl From<MouseCommand> for Command {
    fn from(c: MouseCommand) -> Self {
        Command::Mouse(c)
    }
}

impl From<KeyboardCommand> for Command {
    fn from(c: KeyboardCommand) -> Self {
        Command::Keyboard(c)
    }
}

/// Single byte sent by the device to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    ScreenCalibrationRequest,
    MouseCalibrationRequest,
    CommandComplete,
}

impl ControlSignal {
    pub const fn byte(self) -> u8 {
        match self {
            ControlSignal::ScreenCalibrationRequest => SCREEN_CALIBRATE,
            ControlSignal::MouseCalibrationRequest => MOUSE_CALIBRATE,
            ControlSignal::CommandComplete => COMMAND_COMPLETE,
        }
    }
}

// Names accepted on the command line.

impl FromStr for MouseButton {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            _ => Err(()),
        }
    }
}

impl FromStr for KeyCode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let key = match lower.as_str() {
            "ctrl" | "lctrl" => KeyCode::LEFT_CTRL,
            "shift" | "lshift" => KeyCode::LEFT_SHIFT,
            "alt" | "lalt" => KeyCode::LEFT_ALT,
            "gui" | "lgui" | "win" | "cmd" => KeyCode::LEFT_GUI,
            "rctrl" => KeyCode::RIGHT_CTRL,
            "rshift" => KeyCode::RIGHT_SHIFT,
            "ralt" => KeyCode::RIGHT_ALT,
            "rgui" => KeyCode::RIGHT_GUI,
            "up" => KeyCode::UP_ARROW,
            "down" => KeyCode::DOWN_ARROW,
            "left" | "leftarrow" => KeyCode::LEFT_ARROW,
            "right" | "rightarrow" => KeyCode::RIGHT_ARROW,
            "backspace" => KeyCode::BACKSPACE,
            "tab" => KeyCode::TAB,
            "enter" | "return" => KeyCode::RETURN,
            "esc" | "escape" => KeyCode::ESC,
            "insert" => KeyCode::INSERT,
            "delete" | "del" => KeyCode::DELETE,
            "pageup" => KeyCode::PAGE_UP,
            "pagedown" => KeyCode::PAGE_DOWN,
            "home" => KeyCode::HOME,
            "end" => KeyCode::END,
            "capslock" => KeyCode::CAPS_LOCK,
            _ => {
                if let Some(n) = lower.strip_prefix('f')
                    && let Ok(n) = n.parse::<u8>()
                    && (1..=12).contains(&n)
                {
                    return Ok(KeyCode(KeyCode::F1.0 + n - 1));
                }
                if let Some(hex) = lower.strip_prefix("0x") {
                    let v = i64::from_str_radix(hex, 16).map_err(|_| ())?;
                    return KeyCode::new(v).ok_or(());
                }
                let mut chars = s.chars();
                return match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::from_char(c).ok_or(()),
                    _ => Err(()),
                };
            }
        };
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ranges_are_disjoint() {
        for b in MouseButton::ALL {
            assert!(KeyCode::new(b.code().into()).is_none());
        }
        for op in [MOUSE_CMD, KEYBOARD_CMD, COMMAND_COMPLETE, SCREEN_CALIBRATE] {
            assert!(KeyCode::new(op.into()).is_none());
            assert!(MouseButton::from_code(op).is_none());
        }
        assert_eq!(KeyCode::new(0xDA), Some(KeyCode::UP_ARROW));
        assert!(KeyCode::new(0).is_none());
        assert!(KeyCode::new(-1).is_none());
    }

    #[test]
    fn typing_profile_bounds() {
        assert!(TypingProfile::new(1, false, 1).is_ok());
        assert!(TypingProfile::new(255, true, 100).is_ok());
        assert!(TypingProfile::new(0, true, 50).is_err());
        assert!(TypingProfile::new(256, true, 50).is_err());
        assert!(TypingProfile::new(80, true, 0).is_err());
        assert!(TypingProfile::new(80, true, 101).is_err());
        let raw = TypingProfile {
            wpm: 80,
            mistakes: false,
            accuracy: 200,
        };
        assert!(matches!(raw.validate(), Err(DeviceError::InvalidArgument(_))));
    }

    #[test]
    fn text_rejects_nul_and_wide_chars() {
        assert!(Text::new("héllo").is_ok());
        assert!(Text::new("a\0b").is_err());
        assert!(Text::new("日本").is_err());
        assert_eq!(Text::new("é").unwrap().bytes().collect::<Vec<_>>(), vec![0xE9]);
    }

    #[test]
    fn payload_text_stops_at_sentinel() {
        assert_eq!(Text::from_payload(&[b'A', 0xE9]), Text::new("Aé").unwrap());
        assert_eq!(Text::from_payload(&[b'h', b'i', 0, b'x']), Text::new("hi").unwrap());
        assert_eq!(Text::from_payload(&[]).as_str(), "");
    }

    #[test]
    fn key_names() {
        assert_eq!("F12".parse::<KeyCode>(), Ok(KeyCode::F12));
        assert_eq!("f1".parse::<KeyCode>(), Ok(KeyCode::F1));
        assert_eq!("ctrl".parse::<KeyCode>(), Ok(KeyCode::LEFT_CTRL));
        assert_eq!("a".parse::<KeyCode>(), Ok(KeyCode(b'a')));
        assert_eq!("0x41".parse::<KeyCode>(), Ok(KeyCode(b'A')));
        assert!("0xEA".parse::<KeyCode>().is_err());
        assert!("f13".parse::<KeyCode>().is_err());
        assert!("ab".parse::<KeyCode>().is_err());
        assert_eq!("Middle".parse::<MouseButton>(), Ok(MouseButton::Middle));
    }
}
