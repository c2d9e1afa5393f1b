//! Volume identity labels for PersistentVolume mounts.
//!
//! Label groups are built separately and combined with [`merge`], where a
//! later group overrides keys of an earlier one. Keys are sanitized while
//! merging, so two raw keys with the same sanitized name collide there.

use crate::client::{KubeResource, ResourceKind, ResourceResolver};
use crate::error::{ExporterError, Result};
use crate::filter::pv_name;
use crate::metrics::{sanitize_label_name, Labels};
use crate::mounts::Mount;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Merge label groups into one with sanitized label names.
///
/// On a collision of sanitized names the rightmost group wins.
pub fn merge<I>(groups: I) -> Labels
where
    I: IntoIterator<Item = Labels>,
{
    groups
        .into_iter()
        .flatten()
        .map(|(key, value)| (sanitize_label_name(&key), value))
        .collect()
}

pub fn prefix_keys(prefix: &str, labels: &Labels) -> Labels {
    labels
        .iter()
        .map(|(key, value)| (format!("{}{}", prefix, key), value.clone()))
        .collect()
}

/// The mount's own fields, with the host root stripped from the mountpoint.
pub fn raw_mount_labels(mount: &Mount, host_root: &str) -> Labels {
    let mountpoint = mount
        .mountpoint
        .strip_prefix(host_root)
        .unwrap_or(&mount.mountpoint);

    Labels::from([
        ("device".to_string(), mount.device.clone()),
        ("mountpoint".to_string(), mountpoint.to_string()),
        ("fstype".to_string(), mount.fstype.clone()),
        ("opts".to_string(), mount.opts.clone()),
    ])
}

/// Storage backend labels of a PersistentVolume.
///
/// Only GCE persistent disks are recognized; other backends produce no
/// labels.
pub fn backend_labels(pv: &KubeResource) -> Labels {
    match pv.gce_persistent_disk() {
        Some(disk) => Labels::from([
            ("volume_type".to_string(), "gce-pd".to_string()),
            ("volume_instance".to_string(), disk.pd_name.clone()),
        ]),
        None => Labels::new(),
    }
}

/// Unified `volume_*` labels.
///
/// A claim with labels is the volume's identity; otherwise the
/// PersistentVolume is.
pub fn volume_labels(pv: &KubeResource, pvc: Option<&KubeResource>) -> Labels {
    let (source, resource) = match pvc {
        Some(pvc) if !pvc.labels().is_empty() => ("pvc", pvc),
        _ => ("pv", pv),
    };

    merge([
        prefix_keys("volume_", &resource.labels()),
        Labels::from([
            ("volume_label_source".to_string(), source.to_string()),
            ("volume_name".to_string(), resource.name().to_string()),
        ]),
    ])
}

/// Builds label sets for PersistentVolume mounts.
pub struct LabelEnricher<R> {
    resolver: Arc<R>,
}

impl<R> Clone for LabelEnricher<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
        }
    }
}

impl<R: ResourceResolver> LabelEnricher<R> {
    pub fn new(resolver: Arc<R>) -> Self {
        Self { resolver }
    }

    /// Labels identifying the PersistentVolume (and claim) behind `mount`.
    ///
    /// Fails with [`ExporterError::ResourceNotFound`] when the mountpoint
    /// names no PersistentVolume or the PersistentVolume cannot be fetched.
    /// A claim that cannot be fetched is treated as absent.
    pub async fn labels_for(&self, mount: &Mount) -> Result<Labels> {
        let Some(pv_name) = pv_name(&mount.mountpoint) else {
            debug!("No PV name in mountpoint {}", mount.mountpoint);
            return Err(ExporterError::ResourceNotFound {
                kind: ResourceKind::PersistentVolume,
                name: mount.mountpoint.clone(),
            });
        };

        let pv = self
            .resolver
            .fetch(ResourceKind::PersistentVolume, None, pv_name)
            .await?;

        let pv_labels = pv.labels();
        info!(pv_name, ?pv_labels, "pv labels");

        let mut groups = vec![
            Labels::from([("pv_name".to_string(), pv_name.to_string())]),
            prefix_keys("pv_", &pv_labels),
        ];

        let pvc = match pv.claim_ref() {
            Some(claim) => {
                match self
                    .resolver
                    .fetch(
                        ResourceKind::PersistentVolumeClaim,
                        claim.namespace.as_deref(),
                        &claim.name,
                    )
                    .await
                {
                    Ok(pvc) => Some(pvc),
                    Err(e) => {
                        warn!(pv_name, pvc_name = %claim.name, "Continuing without claim labels: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        if let Some(pvc) = &pvc {
            let pvc_labels = pvc.labels();
            info!(pvc_name = pvc.name(), ?pvc_labels, "pvc labels");
            groups.push(merge([
                Labels::from([("pvc_name".to_string(), pvc.name().to_string())]),
                prefix_keys("pvc_", &pvc_labels),
            ]));
        }

        groups.push(volume_labels(&pv, pvc.as_ref()));
        groups.push(backend_labels(&pv));

        Ok(merge(groups))
    }
}
