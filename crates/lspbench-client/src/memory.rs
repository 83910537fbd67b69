//! Resident memory sampling for server processes.
//!
//! Sampling is best effort. Every probe answers with a [`MemoryReading`],
//! and [`MemoryReading::Unavailable`] covers exited processes, sandboxed
//! platforms and any read failure, so callers never branch on the platform.

use std::fs;
use std::path::PathBuf;

use sysinfo::{Pid, System};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;
const KILOBYTES_PER_MEGABYTE: f64 = 1024.0;

/// Outcome of a memory sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryReading {
    /// Resident set size in megabytes.
    Megabytes(f64),
    /// No measurement could be taken.
    Unavailable,
}

impl MemoryReading {
    /// Returns the measurement when one was taken.
    #[must_use]
    pub const fn megabytes(self) -> Option<f64> {
        match self {
            Self::Megabytes(value) => Some(value),
            Self::Unavailable => None,
        }
    }

    fn from_bytes(bytes: u64) -> Self {
        if bytes == 0 {
            return Self::Unavailable;
        }
        Self::Megabytes(bytes as f64 / BYTES_PER_MEGABYTE)
    }
}

/// Reads the resident memory of a process.
#[cfg_attr(test, mockall::automock)]
pub trait MemoryProbe: Send {
    /// Samples the process identified by `pid`; `None` means the session has
    /// no operating system process behind it.
    fn sample(&self, pid: Option<u32>) -> MemoryReading;
}

/// Parses `VmRSS` from `/proc/<pid>/status`.
#[derive(Debug, Clone)]
pub struct ProcStatusProbe {
    root: PathBuf,
}

impl ProcStatusProbe {
    /// Creates a probe reading the given procfs mount point.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcStatusProbe {
    fn default() -> Self {
        Self::with_root("/proc")
    }
}

impl MemoryProbe for ProcStatusProbe {
    fn sample(&self, pid: Option<u32>) -> MemoryReading {
        let Some(pid) = pid else {
            return MemoryReading::Unavailable;
        };
        let path = self.root.join(pid.to_string()).join("status");
        fs::read_to_string(path)
            .ok()
            .and_then(|status| parse_vm_rss_kb(&status))
            .filter(|kilobytes| *kilobytes > 0)
            .map_or(MemoryReading::Unavailable, |kilobytes| {
                MemoryReading::Megabytes(kilobytes as f64 / KILOBYTES_PER_MEGABYTE)
            })
    }
}

fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

/// Cross-platform probe backed by `sysinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoProbe;

impl MemoryProbe for SysinfoProbe {
    fn sample(&self, pid: Option<u32>) -> MemoryReading {
        let Some(pid) = pid else {
            return MemoryReading::Unavailable;
        };
        let system = System::new_all();
        system
            .process(Pid::from_u32(pid))
            .map_or(MemoryReading::Unavailable, |process| {
                MemoryReading::from_bytes(process.memory())
            })
    }
}

/// Tries each probe in order and returns the first available reading.
pub struct FallbackProbe {
    probes: Vec<Box<dyn MemoryProbe>>,
}

impl FallbackProbe {
    /// Creates a chain from the given probes.
    #[must_use]
    pub fn new(probes: Vec<Box<dyn MemoryProbe>>) -> Self {
        Self { probes }
    }
}

impl MemoryProbe for FallbackProbe {
    fn sample(&self, pid: Option<u32>) -> MemoryReading {
        self.probes
            .iter()
            .map(|probe| probe.sample(pid))
            .find(|reading| reading.megabytes().is_some())
            .unwrap_or(MemoryReading::Unavailable)
    }
}

/// Reports a fixed reading regardless of the process.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub MemoryReading);

impl MemoryProbe for FixedProbe {
    fn sample(&self, _pid: Option<u32>) -> MemoryReading {
        self.0
    }
}

/// Returns the probe chain suited to the current platform.
#[must_use]
pub fn platform_probe() -> Box<dyn MemoryProbe> {
    let mut probes: Vec<Box<dyn MemoryProbe>> = Vec::new();
    if cfg!(target_os = "linux") {
        probes.push(Box::new(ProcStatusProbe::default()));
    }
    probes.push(Box::new(SysinfoProbe));
    Box::new(FallbackProbe::new(probes))
}
