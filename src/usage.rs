//! Filesystem usage statistics.

use crate::error::Result;
use crate::metrics::{Labels, Metric, MetricSample};
use rustix::fs::statvfs;
use serde::Serialize;
use std::path::Path;

/// Usage of one filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    /// Available to unprivileged users
    pub free: u64,
    pub percent: f64,
}

impl DiskUsage {
    /// Build usage from block counts, the way `df` reports it.
    ///
    /// Blocks reserved for root count neither as used nor as free, so
    /// `percent` is relative to `used + free` rather than `total`.
    pub fn from_blocks(blocks: u64, blocks_free: u64, blocks_avail: u64, block_size: u64) -> Self {
        let total = blocks.saturating_mul(block_size);
        let used = blocks.saturating_sub(blocks_free).saturating_mul(block_size);
        let free = blocks_avail.saturating_mul(block_size);

        let user_total = used.saturating_add(free);
        let percent = if user_total == 0 {
            0.0
        } else {
            (used as f64 / user_total as f64 * 1000.0).round() / 10.0
        };

        Self {
            total,
            used,
            free,
            percent,
        }
    }

    /// The four usage samples, each carrying `labels`.
    pub fn samples(&self, labels: &Labels) -> Vec<MetricSample> {
        vec![
            MetricSample::new(Metric::UsagePercent, self.percent, labels.clone()),
            MetricSample::new(Metric::AvailableBytes, self.free as f64, labels.clone()),
            MetricSample::new(Metric::UsedBytes, self.used as f64, labels.clone()),
            MetricSample::new(Metric::TotalBytes, self.total as f64, labels.clone()),
        ]
    }
}

/// Source of usage statistics for a path.
///
/// Implementations may block; callers run them on the blocking pool.
pub trait UsageSource: Send + Sync + 'static {
    fn usage(&self, path: &Path) -> Result<DiskUsage>;
}

/// Usage read with `statvfs(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statvfs;

impl UsageSource for Statvfs {
    fn usage(&self, path: &Path) -> Result<DiskUsage> {
        let stat = statvfs(path).map_err(std::io::Error::from)?;

        // f_blocks is counted in f_frsize units; some filesystems leave it 0
        let block_size = if stat.f_frsize > 0 {
            stat.f_frsize as u64
        } else {
            stat.f_bsize as u64
        };

        Ok(DiskUsage::from_blocks(
            stat.f_blocks as u64,
            stat.f_bfree as u64,
            stat.f_bavail as u64,
            block_size,
        ))
    }
}
