//! System memory-pressure probe used by the queue's second backpressure tier.
//!
//! Polling `sysinfo` is not free, so readings are cached and refreshed at
//! most every 500 ms.  The queue only consults the probe once its depth
//! exceeds the worker count, which keeps the common path off the syscall.

use std::time::{Duration, Instant};

use sysinfo::System;

const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
enum ProbeKind {
    Live {
        system: System,
        last_refresh: Option<Instant>,
        cached: f64,
    },
    /// Pinned reading. Used by tests and to disable the memory tier entirely
    /// (`MemoryProbe::fixed(0.0)`).
    Fixed(f64),
}

/// Reports system memory pressure as `used / total` in `0.0..=1.0`.
#[derive(Debug)]
pub struct MemoryProbe {
    kind: ProbeKind,
}

impl MemoryProbe {
    pub fn new() -> Self {
        MemoryProbe {
            kind: ProbeKind::Live {
                system: System::new(),
                last_refresh: None,
                cached: 0.0,
            },
        }
    }

    /// A probe that always reports the given pressure.
    pub fn fixed(pressure: f64) -> Self {
        MemoryProbe {
            kind: ProbeKind::Fixed(pressure),
        }
    }

    /// Current memory pressure, refreshed at most every 500 ms.
    pub fn pressure(&mut self) -> f64 {
        match &mut self.kind {
            ProbeKind::Fixed(p) => *p,
            ProbeKind::Live {
                system,
                last_refresh,
                cached,
            } => {
                let stale = match last_refresh {
                    None => true,
                    Some(at) => at.elapsed() >= REFRESH_INTERVAL,
                };
                if stale {
                    system.refresh_memory();
                    let total = system.total_memory();
                    *cached = if total == 0 {
                        0.0
                    } else {
                        system.used_memory() as f64 / total as f64
                    };
                    *last_refresh = Some(Instant::now());
                }
                *cached
            }
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        MemoryProbe::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_probe_reports_pinned_value() {
        let mut probe = MemoryProbe::fixed(0.42);
        assert_eq!(probe.pressure(), 0.42);
        assert_eq!(probe.pressure(), 0.42);
    }

    #[test]
    fn live_probe_reports_sane_range() {
        let mut probe = MemoryProbe::new();
        let p = probe.pressure();
        assert!((0.0..=1.0).contains(&p), "pressure out of range: {p}");
    }
}
