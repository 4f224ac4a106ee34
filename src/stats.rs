use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Link counters, updated by callers and the reader loop.
#[derive(Debug)]
pub struct LinkStats {
    commands: AtomicU64,
    completions: AtomicU64,
    screen_calibrations: AtomicU64,
    mouse_calibrations: AtomicU64,
    ignored: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    t0: Instant,
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub commands: u64,
    pub completions: u64,
    pub screen_calibrations: u64,
    pub mouse_calibrations: u64,
    pub ignored: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            commands: AtomicU64::new(0),
            completions: AtomicU64::new(0),
            screen_calibrations: AtomicU64::new(0),
            mouse_calibrations: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            t0: Instant::now(),
        }
    }
    pub fn inc_commands(&self) {
        self.commands.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_completions(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_screen_calibrations(&self) {
        self.screen_calibrations.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_mouse_calibrations(&self) {
        self.mouse_calibrations.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_bytes_in(&self, n: usize) {
        self.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
    }
    pub fn add_bytes_out(&self, n: usize) {
        self.bytes_out.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commands: self.commands.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            screen_calibrations: self.screen_calibrations.load(Ordering::Relaxed),
            mouse_calibrations: self.mouse_calibrations.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }

    pub fn log(&self) {
        let s = self.snapshot();
        let dur = self.t0.elapsed().as_secs_f64().max(1e-3);
        tracing::info!(
            "link: commands={} completions={} screen_cal={} mouse_cal={} ignored={} in={}B out={}B over {:.1}s",
            s.commands,
            s.completions,
            s.screen_calibrations,
            s.mouse_calibrations,
            s.ignored,
            s.bytes_in,
            s.bytes_out,
            dur,
        );
    }
}
