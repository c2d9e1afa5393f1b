//! Selection of the mounts worth exporting.
//!
//! Only mounts visible through the host root prefix are considered. Of
//! those, the ones the kubelet created for GCE persistent disks are kept,
//! or all of them when exporting every mount.

use crate::mounts::Mount;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

// Example:
// /rootfs/var/lib/kubelet/pods/4bb9d022-5a63-11e7-ba69-42010af0012c/volumes/
// kubernetes.io~gce-pd/pvc-4bb92cb4-5a63-11e7-ba69-42010af0012c
//
// The kubelet separates the plugin vendor and name with a tilde.
static MOUNTPOINT_PV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*/kubelet/pods/.*?volumes/kubernetes\.io~gce-pd/(?P<pv_name>[^/]+)$")
        .expect("static PV mountpoint pattern is valid")
});

/// Extract the PersistentVolume name from a kubelet volume mountpoint.
pub fn pv_name(mountpoint: &str) -> Option<&str> {
    MOUNTPOINT_PV_RE
        .captures(mountpoint)
        .and_then(|caps| caps.name("pv_name"))
        .map(|m| m.as_str())
}

/// Inclusion policy for discovered mounts.
#[derive(Debug, Clone)]
pub struct MountFilter {
    host_root: String,
    mounter_prefix: String,
    export_all_mounts: bool,
}

impl MountFilter {
    /// Trailing slashes of `host_root` are ignored; `/` becomes the empty prefix.
    pub fn new(host_root: &str, export_all_mounts: bool) -> Self {
        let root = host_root.trim_end_matches('/');
        Self {
            host_root: root.to_string(),
            mounter_prefix: format!("{}/home/kubernetes/containerized_mounter/", root),
            export_all_mounts,
        }
    }

    pub fn host_root(&self) -> &str {
        &self.host_root
    }

    /// Decide whether `mount` is exported.
    pub fn include(&self, mount: &Mount) -> bool {
        // Mounts replayed by the containerized mounter duplicate host mounts.
        let is_not_mounter_duplicate = !mount.mountpoint.starts_with(&self.mounter_prefix);
        let is_mounted_on_host = mount.mountpoint.starts_with(&self.host_root);
        let is_pv = pv_name(&mount.mountpoint).is_some();

        let include =
            is_not_mounter_duplicate && is_mounted_on_host && (is_pv || self.export_all_mounts);

        debug!(
            mountpoint = %mount.mountpoint,
            is_not_mounter_duplicate,
            is_mounted_on_host,
            is_pv,
            export_all_mounts = self.export_all_mounts,
            include,
            "mount filter"
        );

        include
    }
}
