//! Resource probing for the watch loop

use partsync_common::{Result, SyncError};
use tracing::debug;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Source of the available-memory figure
pub trait ResourceProbe: Send + Sync {
    /// Bytes currently available, or `None` when the platform has no probe
    fn available_bytes(&self) -> Option<u64>;
}

/// Reads `MemAvailable` from `/proc/meminfo` on Linux
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemoryProbe;

impl ResourceProbe for SystemMemoryProbe {
    #[cfg(target_os = "linux")]
    fn available_bytes(&self) -> Option<u64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&meminfo)
    }

    #[cfg(not(target_os = "linux"))]
    fn available_bytes(&self) -> Option<u64> {
        None
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let mut fields = line.split_whitespace().skip(1);
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

/// Threshold check run before every scan
pub struct MemoryGate {
    probe: Box<dyn ResourceProbe>,
    min_available_bytes: u64,
}

impl MemoryGate {
    pub fn new(probe: Box<dyn ResourceProbe>, min_available_mb: u64) -> Self {
        Self {
            probe,
            min_available_bytes: min_available_mb.saturating_mul(BYTES_PER_MB),
        }
    }

    /// `ResourceUnavailable` when available memory is below the threshold.
    /// Passes when the probe has no reading.
    pub fn check(&self) -> Result<()> {
        match self.probe.available_bytes() {
            Some(available) if available < self.min_available_bytes => Err(SyncError::ResourceUnavailable(format!(
                "{} MB available, {} MB required",
                available / BYTES_PER_MB,
                self.min_available_bytes / BYTES_PER_MB
            ))),
            Some(available) => {
                debug!(available_mb = available / BYTES_PER_MB, "Memory check passed");
                Ok(())
            },
            None => Ok(()),
        }
    }
}
