//! Phase timing and memory sampling.
//!
//! Memory is the resident set size of the current process. Peak is the
//! largest sample seen during a phase: samples are taken when the phase
//! starts and ends, and at every checkpoint the caller reports in between.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use sysinfo::System;

/// Source of memory readings, in bytes.
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> Option<u64>;
}

/// Resident set size of this process, read through `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn sample(&self) -> Option<u64> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut system = System::new();
        system.refresh_process(pid);
        system.process(pid).map(|process| process.memory())
    }
}

/// Probe that never reports memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemory;

impl MemoryProbe for NoMemory {
    fn sample(&self) -> Option<u64> {
        None
    }
}

/// Duration and memory of one phase of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStats {
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Memory when the phase ended, in bytes.
    pub memory_final: Option<u64>,
    /// Largest memory sample during the phase, in bytes.
    pub memory_peak: Option<u64>,
}

/// Measures one phase.
pub struct PhaseMeter<'a> {
    probe: &'a dyn MemoryProbe,
    started: Instant,
    peak: Option<u64>,
}

impl<'a> PhaseMeter<'a> {
    pub fn start(probe: &'a dyn MemoryProbe) -> Self {
        let mut meter = Self {
            probe,
            started: Instant::now(),
            peak: None,
        };
        meter.checkpoint();
        meter
    }

    /// Take a memory sample and fold it into the peak.
    pub fn checkpoint(&mut self) -> Option<u64> {
        let sample = self.probe.sample();
        if let Some(bytes) = sample {
            self.peak = Some(self.peak.map_or(bytes, |peak| peak.max(bytes)));
        }
        sample
    }

    pub fn finish(mut self) -> PhaseStats {
        let memory_final = self.checkpoint();
        PhaseStats {
            duration: self.started.elapsed(),
            memory_final,
            memory_peak: self.peak,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(millis.max(0.0) / 1000.0))
    }
}
