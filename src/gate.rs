//! Single-slot acknowledgement gate between the reader loop and the caller.
//!
//! `signal` latches one completion; `wait` consumes it. Signals do not
//! accumulate: two completions before a wait satisfy that one wait only.
//! Closing or faulting the gate wakes every waiter with an error.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{DeviceError, DeviceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Open,
    Closed,
    Faulted(String),
}

#[derive(Debug)]
struct State {
    signaled: bool,
    status: Status,
}

#[derive(Debug)]
pub struct AckGate {
    state: Mutex<State>,
    cond: Condvar,
}

impl Default for AckGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AckGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                signaled: false,
                status: Status::Open,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn signal(&self) {
        self.state.lock().signaled = true;
        self.cond.notify_one();
    }

    /// Drops a latched completion so the next `wait` only sees new ones.
    pub fn arm(&self) {
        self.state.lock().signaled = false;
    }

    /// Blocks until signaled, then clears the slot before returning.
    ///
    /// With `timeout`, gives up after that long with [`DeviceError::Timeout`]
    /// and leaves the gate armed.
    pub fn wait(&self, timeout: Option<Duration>) -> DeviceResult<()> {
        let deadline = timeout.map(|t| (Instant::now() + t, t));
        let mut st = self.state.lock();
        loop {
            if st.signaled {
                st.signaled = false;
                return Ok(());
            }
            check(&st.status)?;
            match deadline {
                None => self.cond.wait(&mut st),
                Some((at, t)) => {
                    if self.cond.wait_until(&mut st, at).timed_out() && !st.signaled {
                        check(&st.status)?;
                        return Err(DeviceError::Timeout(t));
                    }
                }
            }
        }
    }

    /// Fails fast if the gate is closed or faulted.
    pub fn check(&self) -> DeviceResult<()> {
        check(&self.state.lock().status)
    }

    /// Wakes all waiters with [`DeviceError::SessionClosed`]. A fault
    /// recorded earlier is kept.
    pub fn close(&self) {
        let mut st = self.state.lock();
        if st.status == Status::Open {
            st.status = Status::Closed;
        }
        drop(st);
        self.cond.notify_all();
    }

    /// Wakes all waiters with [`DeviceError::TransportFault`]. The first
    /// fault wins; a closed gate stays closed.
    pub fn fault(&self, reason: impl Into<String>) {
        let mut st = self.state.lock();
        if st.status == Status::Open {
            st.status = Status::Faulted(reason.into());
        }
        drop(st);
        self.cond.notify_all();
    }
}

fn check(status: &Status) -> DeviceResult<()> {
    match status {
        Status::Open => Ok(()),
        Status::Closed => Err(DeviceError::SessionClosed),
        Status::Faulted(reason) => Err(DeviceError::TransportFault(reason.clone())),
    }
}
