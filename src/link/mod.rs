//! Serial link to the sorting microcontroller.
//!
//! The link is best-effort: absence is non-fatal and the station degrades to
//! detection-only mode with no physical action. Line-delimited text in both
//! directions; see [`protocol`] for the message formats.
//!
//! `LoopbackLink` is an in-memory pair used by tests and stub demo runs.
//! A real port lives behind the `link-serialport` feature.

pub mod protocol;
#[cfg(feature = "link-serialport")]
mod port;

#[cfg(feature = "link-serialport")]
pub use port::PortLink;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;

/// Fixed link parameters.
pub const BAUD_RATE: u32 = 115_200;
pub const READ_TIMEOUT_MS: u64 = 1_000;

/// A line-oriented serial link.
pub trait SerialLink: Send {
    /// Write one newline-terminated line.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Poll for one complete inbound line without blocking.
    ///
    /// Returns `Ok(None)` when no complete line is pending.
    fn poll_line(&mut self) -> Result<Option<String>>;
}

/// Shared handle to the (optional) link.
///
/// The actuation worker and the serial listener both hold this. The mutex is
/// held only for the duration of one write or one poll; the actuation dwell
/// is guarded separately so the listener keeps polling during actuation.
pub type SharedLink = Arc<Mutex<Option<Box<dyn SerialLink>>>>;

pub fn shared(link: Option<Box<dyn SerialLink>>) -> SharedLink {
    Arc::new(Mutex::new(link))
}

// ----------------------------------------------------------------------------
// Loopback link (tests / stub demo)
// ----------------------------------------------------------------------------

#[derive(Default)]
struct LoopbackState {
    /// Lines written by the station (outbound commands).
    written: Vec<String>,
    /// Lines queued for the station to read (inbound signals).
    inbound: VecDeque<String>,
    /// When set, `write_line` fails with this message (fault injection).
    write_fault: Option<String>,
}

/// In-memory serial link.
///
/// The paired [`LoopbackRemote`] plays the microcontroller: it observes
/// outbound commands and injects inbound signal lines.
pub struct LoopbackLink {
    state: Arc<Mutex<LoopbackState>>,
}

/// Test-side handle to a [`LoopbackLink`].
#[derive(Clone)]
pub struct LoopbackRemote {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackLink {
    pub fn pair() -> (Self, LoopbackRemote) {
        let state = Arc::new(Mutex::new(LoopbackState::default()));
        (
            Self {
                state: state.clone(),
            },
            LoopbackRemote { state },
        )
    }
}

impl SerialLink for LoopbackLink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("loopback state poisoned"))?;
        if let Some(fault) = &state.write_fault {
            anyhow::bail!("serial write failed: {}", fault);
        }
        state.written.push(line.to_string());
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("loopback state poisoned"))?;
        Ok(state.inbound.pop_front())
    }
}

impl LoopbackRemote {
    /// Outbound commands written by the station so far.
    pub fn written(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.written.clone())
            .unwrap_or_default()
    }

    /// Queue an inbound line for the station to read.
    pub fn inject(&self, line: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.inbound.push_back(line.to_string());
        }
    }

    /// Make subsequent writes fail (simulated port fault).
    pub fn fail_writes(&self, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.write_fault = Some(message.to_string());
        }
    }

    /// Restore normal writes.
    pub fn clear_fault(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.write_fault = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_carries_lines_both_ways() -> Result<()> {
        let (mut link, remote) = LoopbackLink::pair();

        link.write_line("CLASS:QITA")?;
        assert_eq!(remote.written(), vec!["CLASS:QITA"]);

        remote.inject("DONE");
        assert_eq!(link.poll_line()?, Some("DONE".to_string()));
        assert_eq!(link.poll_line()?, None);
        Ok(())
    }

    #[test]
    fn injected_fault_fails_writes() {
        let (mut link, remote) = LoopbackLink::pair();
        remote.fail_writes("unplugged");
        assert!(link.write_line("CLASS:QITA").is_err());
        remote.clear_fault();
        assert!(link.write_line("CLASS:QITA").is_ok());
    }
}
