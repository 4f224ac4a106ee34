use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use keymouse::{Input, KeyCode, MouseButton, SessionConfig, TypingProfile};

#[derive(Parser, Debug, Clone)]
#[command(name = "keymouse", about = "Drive a serial keyboard/mouse emulator")]
pub struct Cli {
    #[command(flatten)]
    pub ser: SerialOpts,
    /// Log every byte exchanged with the device
    #[arg(long, default_value_t = false, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// List serial ports
    Ports,
    /// Press and hold a key or mouse button
    Press { key: String },
    /// Release a key or mouse button
    Release { key: String },
    /// Release every held key
    ReleaseAll,
    /// Click a mouse button
    Click {
        #[arg(default_value = "left")]
        button: String,
    },
    /// Click without the humanized press/release delay
    FastClick {
        #[arg(default_value = "left")]
        button: String,
    },
    /// Move the pointer to absolute coordinates
    Move { x: f64, y: f64 },
    /// Move the pointer along a curved path
    Bezier { x: f64, y: f64 },
    /// Write a key, or print text
    Write {
        text: String,
        /// Append a newline
        #[arg(long, default_value_t = false)]
        endl: bool,
    },
    /// Type text like a human would
    Type(TypeOpts),
}

#[derive(Args, Debug, Clone)]
pub struct SerialOpts {
    /// Serial device path; detected from USB descriptors when omitted
    #[arg(long, global = true)]
    pub dev: Option<String>,
    /// Baud rate (must match the firmware)
    #[arg(long, default_value_t = 115_200, global = true)]
    pub baud: u32,
    /// Enable RTS/CTS
    #[arg(long, default_value_t = false, global = true)]
    pub rtscts: bool,
    /// Completion timeout in ms; 0 waits forever
    #[arg(long, default_value_t = 30_000, global = true)]
    pub timeout_ms: u64,
    /// Screen size reported on calibration, WIDTHxHEIGHT
    #[arg(long, default_value = "1920x1080", value_parser = parse_pair, global = true)]
    pub screen: (u16, u16),
    /// Pointer position reported on calibration, XxY
    #[arg(long, default_value = "0x0", value_parser = parse_pair, global = true)]
    pub pointer: (u16, u16),
}

#[derive(Args, Debug, Clone)]
pub struct TypeOpts {
    pub text: String,
    /// Words per minute (1..=255)
    #[arg(long, default_value_t = 80)]
    pub wpm: u32,
    /// Accuracy percentage (1..=100)
    #[arg(long, default_value_t = 96)]
    pub accuracy: u32,
    /// Never inject typos
    #[arg(long, default_value_t = false)]
    pub no_mistakes: bool,
}

impl SerialOpts {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            port: self.dev.clone(),
            baud: self.baud,
            rtscts: self.rtscts,
            ack_timeout: match self.timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            ..SessionConfig::default()
        }
    }
}

impl TypeOpts {
    pub fn profile(&self) -> anyhow::Result<TypingProfile> {
        Ok(TypingProfile::new(self.wpm, !self.no_mistakes, self.accuracy)?)
    }
}

/// Mouse buttons by name first, then key names, hex codes and single chars.
pub fn parse_input(s: &str) -> anyhow::Result<Input> {
    if let Ok(b) = s.parse::<MouseButton>() {
        return Ok(b.into());
    }
    if let Ok(k) = s.parse::<KeyCode>() {
        return Ok(k.into());
    }
    Err(anyhow!("unknown key or button: {s:?}"))
}

fn parse_pair(s: &str) -> anyhow::Result<(u16, u16)> {
    let (a, b) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected AxB, got {s:?}"))?;
    let a = a.trim().parse().map_err(|_| anyhow!("bad number {a:?}"))?;
    let b = b.trim().parse().map_err(|_| anyhow!("bad number {b:?}"))?;
    Ok((a, b))
}
