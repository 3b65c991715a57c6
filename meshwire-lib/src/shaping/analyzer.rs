use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Running aggregate of on-wire packet sizes.
#[derive(Debug)]
pub struct TrafficAnalyzer {
    packets: AtomicU64,
    bytes: AtomicU64,
    min: AtomicUsize,
    max: AtomicUsize,
}

/// Point-in-time view of the size distribution.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SizeStats {
    pub packets: u64,
    pub total_bytes: u64,
    pub min_bytes: usize,
    pub max_bytes: usize,
    pub mean_bytes: f64,
}

impl Default for TrafficAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficAnalyzer {
    pub fn new() -> Self {
        Self {
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            min: AtomicUsize::new(usize::MAX),
            max: AtomicUsize::new(0),
        }
    }

    pub fn record_packet(&self, size: usize) {
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size as u64, Ordering::Relaxed);
        self.min.fetch_min(size, Ordering::Relaxed);
        self.max.fetch_max(size, Ordering::Relaxed);
    }

    pub fn statistics(&self) -> SizeStats {
        let packets = self.packets.load(Ordering::Relaxed);
        if packets == 0 {
            return SizeStats::default();
        }
        let total_bytes = self.bytes.load(Ordering::Relaxed);
        SizeStats {
            packets,
            total_bytes,
            min_bytes: self.min.load(Ordering::Relaxed),
            max_bytes: self.max.load(Ordering::Relaxed),
            mean_bytes: total_bytes as f64 / packets as f64,
        }
    }
}
