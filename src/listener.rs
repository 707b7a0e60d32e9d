//! Serial listener.
//!
//! A long-lived background thread polling the link every 100 ms for
//! `FULL:`/`UNFULL:`/`DONE` signals from the microcontroller. Signals turn
//! into board updates; read or decode errors are logged and polling
//! continues. The listener never terminates on error, only on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::board::BoardUpdate;
use crate::link::{protocol::InboundSignal, SharedLink};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to the listener thread.
pub struct SerialListener {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SerialListener {
    /// Spawn the polling thread. `shutdown` is shared with the caller so a
    /// single flag stops the whole station.
    pub fn spawn(
        link: SharedLink,
        updates: Sender<BoardUpdate>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let thread_shutdown = shutdown.clone();
        let join = std::thread::spawn(move || {
            run_listener(link, updates, thread_shutdown);
        });
        Self {
            shutdown,
            join: Some(join),
        }
    }

    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("serial listener thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for SerialListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_listener(link: SharedLink, updates: Sender<BoardUpdate>, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match poll_once(&link) {
            Ok(Some(line)) => {
                if handle_line(&line, &updates).is_err() {
                    // Board channel closed: the pipeline is gone.
                    break;
                }
                // Drain the rest of the pending lines without sleeping.
                continue;
            }
            Ok(None) => {}
            Err(err) => log::warn!("serial read failed: {}", err),
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

fn poll_once(link: &SharedLink) -> Result<Option<String>> {
    let mut link = link
        .lock()
        .map_err(|_| anyhow!("serial link lock poisoned"))?;
    match link.as_mut() {
        Some(port) => port.poll_line(),
        None => Ok(None),
    }
}

fn handle_line(line: &str, updates: &Sender<BoardUpdate>) -> Result<()> {
    match InboundSignal::parse(line) {
        Some(InboundSignal::Full(category)) => {
            updates.send(BoardUpdate::Full(category, true))?;
            updates.send(BoardUpdate::Log(format!("{}已满载！", category)))?;
        }
        Some(InboundSignal::Unfull(category)) => {
            updates.send(BoardUpdate::Full(category, false))?;
            updates.send(BoardUpdate::Log(format!("{}已恢复正常", category)))?;
        }
        Some(InboundSignal::Done) => {
            // Received but unused for synchronization; completion stays on
            // the fixed dwell timer.
            log::debug!("received actuator done signal");
        }
        None => {
            if !line.trim().is_empty() {
                log::debug!("ignoring unrecognized serial line: {:?}", line);
            }
        }
    }
    Ok(())
}
