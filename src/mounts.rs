//! Mount table enumeration.
//!
//! [`ProcMounts`] reads the kernel mount table in `/proc/self/mounts`
//! format and reports the same mounts `df` would: physical filesystems
//! only, unless configured otherwise.

use crate::config::CollectConfig;
use crate::error::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A mounted filesystem as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Mount {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub opts: String,
}

impl Mount {
    pub fn new(
        device: impl Into<String>,
        mountpoint: impl Into<String>,
        fstype: impl Into<String>,
        opts: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            mountpoint: mountpoint.into(),
            fstype: fstype.into(),
            opts: opts.into(),
        }
    }
}

/// Source of the current mount list.
///
/// Implementations may block; callers run them on the blocking pool.
pub trait MountSource: Send + Sync + 'static {
    fn mounts(&self) -> Result<Vec<Mount>>;
}

/// Mount table backed by procfs.
#[derive(Debug, Clone)]
pub struct ProcMounts {
    mounts_file: PathBuf,
    filesystems_file: PathBuf,
    all_filesystems: bool,
}

impl ProcMounts {
    pub fn new(config: &CollectConfig) -> Self {
        Self {
            mounts_file: config.mounts_file.clone(),
            filesystems_file: config.filesystems_file.clone(),
            all_filesystems: config.all_filesystems,
        }
    }

    /// Filesystem types backed by a block device, or `None` when the table
    /// cannot be read.
    fn physical_filesystems(&self) -> Option<HashSet<String>> {
        match fs::read_to_string(&self.filesystems_file) {
            Ok(data) => Some(parse_filesystems(&data)),
            Err(e) => {
                warn!(
                    "Could not read {}, reporting all filesystems: {}",
                    self.filesystems_file.display(),
                    e
                );
                None
            }
        }
    }
}

impl MountSource for ProcMounts {
    fn mounts(&self) -> Result<Vec<Mount>> {
        let data = fs::read_to_string(&self.mounts_file)?;
        let mounts = parse_mounts(&data);

        if self.all_filesystems {
            return Ok(mounts);
        }

        let Some(physical) = self.physical_filesystems() else {
            return Ok(mounts);
        };

        let total = mounts.len();
        let mounts: Vec<Mount> = mounts
            .into_iter()
            .filter(|m| is_physical(m, &physical))
            .collect();
        debug!(
            "Kept {} of {} mounts from {}",
            mounts.len(),
            total,
            self.mounts_file.display()
        );
        Ok(mounts)
    }
}

fn is_physical(mount: &Mount, physical: &HashSet<String>) -> bool {
    if mount.device.is_empty() || mount.device == "none" {
        return false;
    }
    mount.fstype == "zfs" || physical.contains(&mount.fstype)
}

/// Parse `/proc/filesystems`, returning the types not flagged `nodev`.
fn parse_filesystems(data: &str) -> HashSet<String> {
    data.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nodev"), _) => None,
                (Some(fstype), None) => Some(fstype.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Parse a mount table in `fstab(5)` layout.
pub fn parse_mounts(data: &str) -> Vec<Mount> {
    let mut mounts = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            warn!("Skipping malformed mount table line: {:?}", line);
            continue;
        }
        mounts.push(Mount::new(
            unescape_octal(fields[0]),
            unescape_octal(fields[1]),
            unescape_octal(fields[2]),
            unescape_octal(fields[3]),
        ));
    }
    mounts
}

/// Decode the `\ooo` escapes the kernel uses for whitespace and backslashes.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
