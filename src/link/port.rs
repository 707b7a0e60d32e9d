#![cfg(feature = "link-serialport")]

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};

use super::{SerialLink, BAUD_RATE, READ_TIMEOUT_MS};

/// Real serial port link (115200 baud, 1 s read timeout).
pub struct PortLink {
    port: Box<dyn serialport::SerialPort>,
    /// Bytes read but not yet terminated by a newline.
    pending: Vec<u8>,
}

impl PortLink {
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()
            .with_context(|| format!("failed to open serial port {}", path))?;
        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }
}

impl SerialLink for PortLink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        std::io::Write::write_all(&mut self.port, &bytes).context("serial write failed")?;
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>> {
        // Only drain what is already buffered so polling never blocks for
        // the full read timeout.
        let available = self.port.bytes_to_read().context("serial status failed")? as usize;
        if available > 0 {
            let mut buf = vec![0u8; available];
            let n = self.port.read(&mut buf).context("serial read failed")?;
            self.pending.extend_from_slice(&buf[..n]);
        }

        if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            return Ok(Some(text));
        }
        Ok(None)
    }
}
