// src/proto/codec.rs
use thiserror::Error;

use super::command::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("need more bytes")]
    Incomplete,
    #[error("unknown command family: 0x{0:02X}")]
    UnknownFamily(u8),
    #[error("unknown sub-opcode 0x{op:02X} for family 0x{family:02X}")]
    UnknownOpcode { family: u8, op: u8 },
    #[error("invalid mouse button: 0x{0:02X}")]
    BadButton(u8),
    #[error("invalid key code: 0x{0:02X}")]
    BadKey(u8),
    #[error("invalid typing profile: wpm={wpm} mistakes={mistakes} accuracy={accuracy}")]
    BadProfile { wpm: u8, mistakes: u8, accuracy: u8 },
}

/// Public API: serialize a command into the bytes the device expects.
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);

    match cmd {
        Command::Mouse(m) => {
            out.push(MOUSE_CMD);
            match m {
                MouseCommand::Press(b) => out.extend([MOUSE_PRESS, b.code()]),
                MouseCommand::Release(b) => out.extend([MOUSE_RELEASE, b.code()]),
                MouseCommand::Click(b) => out.extend([MOUSE_CLICK, b.code()]),
                MouseCommand::FastClick(b) => out.extend([MOUSE_FAST_CLICK, b.code()]),
                MouseCommand::Move { x, y } => {
                    out.push(MOUSE_MOVE);
                    out.extend(encode_coords(*x, *y));
                }
                MouseCommand::Bezier { x, y } => {
                    out.push(MOUSE_BEZIER);
                    out.extend(encode_coords(*x, *y));
                }
            }
        }
        Command::Keyboard(k) => {
            out.push(KEYBOARD_CMD);
            match k {
                KeyboardCommand::Press(key) => out.extend([KEYBOARD_PRESS, key.code()]),
                KeyboardCommand::Release(key) => out.extend([KEYBOARD_RELEASE, key.code()]),
                KeyboardCommand::ReleaseAll => out.push(KEYBOARD_RELEASE_ALL),
                KeyboardCommand::Print(text) => {
                    out.push(KEYBOARD_PRINT);
                    push_text(&mut out, text);
                }
                KeyboardCommand::Println(text) => {
                    out.push(KEYBOARD_PRINTLN);
                    push_text(&mut out, text);
                }
                KeyboardCommand::Write(key) => out.extend([KEYBOARD_WRITE, key.code()]),
                KeyboardCommand::Type { text, profile } => {
                    out.push(KEYBOARD_TYPE);
                    push_text(&mut out, text);
                    out.extend([profile.wpm, profile.mistakes as u8, profile.accuracy]);
                }
            }
        }
    }

    out
}

/// Two little-endian u16 values. Used for move targets and calibration replies.
pub fn encode_coords(a: u16, b: u16) -> [u8; 4] {
    let [a0, a1] = a.to_le_bytes();
    let [b0, b1] = b.to_le_bytes();
    [a0, a1, b0, b1]
}

/// Unrecognized bytes yield `None` and are meant to be skipped.
pub fn decode_control(byte: u8) -> Option<ControlSignal> {
    match byte {
        SCREEN_CALIBRATE => Some(ControlSignal::ScreenCalibrationRequest),
        MOUSE_CALIBRATE => Some(ControlSignal::MouseCalibrationRequest),
        COMMAND_COMPLETE => Some(ControlSignal::CommandComplete),
        _ => None,
    }
}

/// Device-side parse of one command from the front of `buf`.
///
/// Returns the command and the number of bytes consumed. This is what the
/// firmware does with the host's bytes; the host uses it only for simulation.
pub fn decode_command(buf: &[u8]) -> Result<(Command, usize), DecodeError> {
    let family = *buf.first().ok_or(DecodeError::Incomplete)?;
    let op = *buf.get(1).ok_or(DecodeError::Incomplete)?;
    let rest = &buf[2..];

    match family {
        MOUSE_CMD => {
            let (cmd, used) = match op {
                MOUSE_PRESS => (MouseCommand::Press(req_button(rest)?), 1),
                MOUSE_RELEASE => (MouseCommand::Release(req_button(rest)?), 1),
                MOUSE_CLICK => (MouseCommand::Click(req_button(rest)?), 1),
                MOUSE_FAST_CLICK => (MouseCommand::FastClick(req_button(rest)?), 1),
                MOUSE_MOVE => {
                    let (x, y) = req_coords(rest)?;
                    (MouseCommand::Move { x, y }, 4)
                }
                MOUSE_BEZIER => {
                    let (x, y) = req_coords(rest)?;
                    (MouseCommand::Bezier { x, y }, 4)
                }
                _ => return Err(DecodeError::UnknownOpcode { family, op }),
            };
            Ok((Command::Mouse(cmd), 2 + used))
        }
        KEYBOARD_CMD => {
            let (cmd, used) = match op {
                KEYBOARD_PRESS => (KeyboardCommand::Press(req_key(rest)?), 1),
                KEYBOARD_RELEASE => (KeyboardCommand::Release(req_key(rest)?), 1),
                KEYBOARD_RELEASE_ALL => (KeyboardCommand::ReleaseAll, 0),
                KEYBOARD_WRITE => (KeyboardCommand::Write(req_key(rest)?), 1),
                KEYBOARD_PRINT => {
                    let (text, used) = req_text(rest)?;
                    (KeyboardCommand::Print(text), used)
                }
                KEYBOARD_PRINTLN => {
                    let (text, used) = req_text(rest)?;
                    (KeyboardCommand::Println(text), used)
                }
                KEYBOARD_TYPE => {
                    let (text, used) = req_text(rest)?;
                    let tail = rest.get(used..used + 3).ok_or(DecodeError::Incomplete)?;
                    let bad = DecodeError::BadProfile {
                        wpm: tail[0],
                        mistakes: tail[1],
                        accuracy: tail[2],
                    };
                    if tail[1] > 1 {
                        return Err(bad);
                    }
                    let profile = TypingProfile::new(tail[0].into(), tail[1] == 1, tail[2].into())
                        .map_err(|_| bad)?;
                    (KeyboardCommand::Type { text, profile }, used + 3)
                }
                _ => return Err(DecodeError::UnknownOpcode { family, op }),
            };
            Ok((Command::Keyboard(cmd), 2 + used))
        }
        _ => Err(DecodeError::UnknownFamily(family)),
    }
}

/* ---------- helpers ---------- */

fn push_text(out: &mut Vec<u8>, text: &Text) {
    out.extend(text.bytes());
    out.push(TEXT_SENTINEL);
}

fn req_button(rest: &[u8]) -> Result<MouseButton, DecodeError> {
    let b = *rest.first().ok_or(DecodeError::Incomplete)?;
    MouseButton::from_code(b).ok_or(DecodeError::BadButton(b))
}

fn req_key(rest: &[u8]) -> Result<KeyCode, DecodeError> {
    let k = *rest.first().ok_or(DecodeError::Incomplete)?;
    KeyCode::new(k.into()).ok_or(DecodeError::BadKey(k))
}

fn req_coords(rest: &[u8]) -> Result<(u16, u16), DecodeError> {
    match rest {
        [x0, x1, y0, y1, ..] => Ok((
            u16::from_le_bytes([*x0, *x1]),
            u16::from_le_bytes([*y0, *y1]),
        )),
        _ => Err(DecodeError::Incomplete),
    }
}

/// Text up to and including the sentinel; returns bytes consumed.
fn req_text(rest: &[u8]) -> Result<(Text, usize), DecodeError> {
    let end = rest
        .iter()
        .position(|&b| b == TEXT_SENTINEL)
        .ok_or(DecodeError::Incomplete)?;
    Ok((Text::from_payload(&rest[..end]), end + 1))
}

/* ---------- tests ---------- */

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> Text {
        Text::new(s).unwrap()
    }

    #[test]
    fn mouse_press_release_layout() {
        for b in MouseButton::ALL {
            let press = encode_command(&MouseCommand::Press(b).into());
            let release = encode_command(&MouseCommand::Release(b).into());
            assert_eq!(press, vec![0xE0, 0xE2, b.code()]);
            assert_eq!(release, vec![0xE0, 0xE3, b.code()]);
        }
    }

    #[test]
    fn print_and_println_layout() {
        let print = encode_command(&KeyboardCommand::Print(text("AB")).into());
        let println = encode_command(&KeyboardCommand::Println(text("AB")).into());
        assert_eq!(print, vec![0xF0, 0xF4, b'A', b'B', 0x00]);
        assert_eq!(println, vec![0xF0, 0xF5, b'A', b'B', 0x00]);
    }

    #[test]
    fn type_appends_profile_after_sentinel() {
        let cmd = KeyboardCommand::Type {
            text: text("hi"),
            profile: TypingProfile {
                wpm: 120,
                mistakes: false,
                accuracy: 90,
            },
        };
        assert_eq!(
            encode_command(&cmd.into()),
            vec![0xF0, 0xF7, b'h', b'i', 0x00, 120, 0, 90]
        );
    }

    #[test]
    fn move_is_little_endian() {
        let cmd = MouseCommand::Move { x: 0x0102, y: 0xFFFF };
        assert_eq!(
            encode_command(&cmd.into()),
            vec![0xE0, 0xE6, 0x02, 0x01, 0xFF, 0xFF]
        );
        let cmd = MouseCommand::Bezier { x: 0, y: 1 };
        assert_eq!(encode_command(&cmd.into()), vec![0xE0, 0xE7, 0, 0, 1, 0]);
    }

    #[test]
    fn release_all_has_no_args() {
        assert_eq!(
            encode_command(&KeyboardCommand::ReleaseAll.into()),
            vec![0xF0, 0xF3]
        );
    }

    #[test]
    fn control_bytes() {
        assert_eq!(decode_control(0xFE), Some(ControlSignal::CommandComplete));
        assert_eq!(decode_control(0xFF), Some(ControlSignal::ScreenCalibrationRequest));
        assert_eq!(decode_control(0xE1), Some(ControlSignal::MouseCalibrationRequest));
        assert_eq!(decode_control(0x00), None);
        assert_eq!(decode_control(b'A'), None);
        for sig in [
            ControlSignal::CommandComplete,
            ControlSignal::ScreenCalibrationRequest,
            ControlSignal::MouseCalibrationRequest,
        ] {
            assert_eq!(decode_control(sig.byte()), Some(sig));
        }
    }

    #[test]
    fn decode_reports_partial_input() {
        assert_eq!(decode_command(&[]), Err(DecodeError::Incomplete));
        assert_eq!(decode_command(&[0xE0]), Err(DecodeError::Incomplete));
        assert_eq!(decode_command(&[0xE0, 0xE6, 1, 0, 2]), Err(DecodeError::Incomplete));
        assert_eq!(decode_command(&[0xF0, 0xF4, b'a']), Err(DecodeError::Incomplete));
        assert_eq!(
            decode_command(&[0xF0, 0xF7, b'a', 0, 80]),
            Err(DecodeError::Incomplete)
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode_command(&[0x41, 0xE2]), Err(DecodeError::UnknownFamily(0x41)));
        assert_eq!(
            decode_command(&[0xE0, 0xF1, 0xEA]),
            Err(DecodeError::UnknownOpcode { family: 0xE0, op: 0xF1 })
        );
        assert_eq!(decode_command(&[0xE0, 0xE4, 0x41]), Err(DecodeError::BadButton(0x41)));
        assert_eq!(decode_command(&[0xF0, 0xF1, 0xEA]), Err(DecodeError::BadKey(0xEA)));
        assert!(matches!(
            decode_command(&[0xF0, 0xF7, 0, 0, 1, 50]),
            Err(DecodeError::BadProfile { .. })
        ));
    }

    #[test]
    fn decode_keeps_latin1_text() {
        let (cmd, used) = decode_command(&[0xF0, 0xF4, b'c', 0xE9, 0]).unwrap();
        assert_eq!(cmd, Command::from(KeyboardCommand::Print(text("cé"))));
        assert_eq!(used, 5);
    }

    #[test]
    fn decode_consumes_exactly_one_command() {
        let mut buf = encode_command(&KeyboardCommand::Println(text("xy")).into());
        buf.extend(encode_command(&KeyboardCommand::ReleaseAll.into()));
        let (first, used) = decode_command(&buf).unwrap();
        assert_eq!(first, KeyboardCommand::Println(text("xy")).into());
        let (second, used2) = decode_command(&buf[used..]).unwrap();
        assert_eq!(second, KeyboardCommand::ReleaseAll.into());
        assert_eq!(used + used2, buf.len());
    }

    fn any_button() -> impl Strategy<Value = MouseButton> {
        prop::sample::select(MouseButton::ALL.to_vec())
    }

    fn any_key() -> impl Strategy<Value = KeyCode> {
        (1i64..=0xDA).prop_map(|k| KeyCode::new(k).unwrap())
    }

    fn any_text() -> impl Strategy<Value = Text> {
        "[ -~\u{a0}-\u{ff}]{0,24}".prop_map(|s| Text::new(&s).unwrap())
    }

    fn any_command() -> impl Strategy<Value = Command> {
        let profile = (1u32..=255, any::<bool>(), 1u32..=100)
            .prop_map(|(w, m, a)| TypingProfile::new(w, m, a).unwrap());
        prop_oneof![
            any_button().prop_map(|b| MouseCommand::Press(b).into()),
            any_button().prop_map(|b| MouseCommand::Release(b).into()),
            any_button().prop_map(|b| MouseCommand::Click(b).into()),
            any_button().prop_map(|b| MouseCommand::FastClick(b).into()),
            (any::<u16>(), any::<u16>()).prop_map(|(x, y)| MouseCommand::Move { x, y }.into()),
            (any::<u16>(), any::<u16>()).prop_map(|(x, y)| MouseCommand::Bezier { x, y }.into()),
            any_key().prop_map(|k| KeyboardCommand::Press(k).into()),
            any_key().prop_map(|k| KeyboardCommand::Release(k).into()),
            any_key().prop_map(|k| KeyboardCommand::Write(k).into()),
            Just(KeyboardCommand::ReleaseAll.into()),
            any_text().prop_map(|t| KeyboardCommand::Print(t).into()),
            any_text().prop_map(|t| KeyboardCommand::Println(t).into()),
            (any_text(), profile)
                .prop_map(|(text, profile)| KeyboardCommand::Type { text, profile }.into()),
        ]
    }

    proptest! {
        #[test]
        fn device_sees_what_host_sent(cmd in any_command()) {
            let bytes = encode_command(&cmd);
            let (decoded, used) = decode_command(&bytes).unwrap();
            prop_assert_eq!(used, bytes.len());
            prop_assert_eq!(decoded, cmd);
        }

        #[test]
        fn family_byte_matches_command_kind(cmd in any_command()) {
            let bytes = encode_command(&cmd);
            let family = match cmd {
                Command::Mouse(_) => MOUSE_CMD,
                Command::Keyboard(_) => KEYBOARD_CMD,
            };
            prop_assert_eq!(bytes[0], family);
        }
    }
}
