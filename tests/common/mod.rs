//! Test doubles for the mount, usage and Kubernetes capabilities.

#![allow(dead_code)]

use pv_disk_usage_exporter::{
    client::{KubeResource, ResourceKind, ResourceResolver},
    config::CollectConfig,
    error::{ExporterError, Result},
    mounts::{Mount, MountSource},
    usage::{DiskUsage, UsageSource},
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;

pub const PV_NAME: &str = "pvc-123";

pub fn pv_mountpoint(pv_name: &str) -> String {
    format!(
        "/rootfs/var/lib/kubelet/pods/3cc99367-5c20-11e7-ba69-42010af0012c/volumes/kubernetes.io~gce-pd/{}",
        pv_name
    )
}

pub fn pv_mount(device: &str, pv_name: &str) -> Mount {
    Mount::new(device, pv_mountpoint(pv_name), "ext4", "rw")
}

pub fn root_mount() -> Mount {
    Mount::new("/dev/root", "/rootfs", "ext2", "ro")
}

pub fn collect_config(export_all_mounts: bool) -> CollectConfig {
    CollectConfig {
        export_all_mounts,
        ..CollectConfig::default()
    }
}

/// Fixed mount list, or an I/O failure.
pub struct StaticMounts(pub Option<Vec<Mount>>);

impl StaticMounts {
    pub fn new(mounts: Vec<Mount>) -> Self {
        Self(Some(mounts))
    }

    pub fn failing() -> Self {
        Self(None)
    }
}

impl MountSource for StaticMounts {
    fn mounts(&self) -> Result<Vec<Mount>> {
        self.0.clone().ok_or_else(|| {
            ExporterError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "mounts"))
        })
    }
}

/// Same usage for every path, except the ones configured to fail.
pub struct FixedUsage {
    pub usage: DiskUsage,
    pub failing: HashSet<String>,
}

impl FixedUsage {
    pub fn new() -> Self {
        Self {
            usage: DiskUsage {
                total: 10_000,
                used: 2_500,
                free: 7_500,
                percent: 25.0,
            },
            failing: HashSet::new(),
        }
    }

    pub fn failing_at(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }
}

impl UsageSource for FixedUsage {
    fn usage(&self, path: &Path) -> Result<DiskUsage> {
        if self.failing.contains(path.to_string_lossy().as_ref()) {
            return Err(ExporterError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no such mount",
            )));
        }
        Ok(self.usage)
    }
}

/// In-memory PersistentVolumes and claims.
#[derive(Default)]
pub struct FakeResolver {
    pvs: HashMap<String, KubeResource>,
    pvcs: HashMap<(String, String), KubeResource>,
    pub calls: AtomicUsize,
}

impl FakeResolver {
    pub fn with_pv(mut self, pv: serde_json::Value) -> Self {
        let pv: KubeResource = serde_json::from_value(pv).unwrap();
        self.pvs.insert(pv.name().to_string(), pv);
        self
    }

    pub fn with_pvc(mut self, pvc: serde_json::Value) -> Self {
        let pvc: KubeResource = serde_json::from_value(pvc).unwrap();
        let namespace = pvc
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        self.pvcs.insert((namespace, pvc.name().to_string()), pvc);
        self
    }
}

impl ResourceResolver for FakeResolver {
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<KubeResource> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let found = match kind {
            ResourceKind::PersistentVolume => self.pvs.get(name),
            ResourceKind::PersistentVolumeClaim => self.pvcs.get(&(
                namespace.unwrap_or("default").to_string(),
                name.to_string(),
            )),
        };
        found.cloned().ok_or_else(|| ExporterError::ResourceNotFound {
            kind,
            name: name.to_string(),
        })
    }
}

/// Delays every lookup, then counts it as completed.
pub struct SlowResolver {
    inner: FakeResolver,
    delay: Duration,
    pub completed: AtomicUsize,
}

impl SlowResolver {
    pub fn new(inner: FakeResolver, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            completed: AtomicUsize::new(0),
        }
    }
}

impl ResourceResolver for SlowResolver {
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<KubeResource> {
        tokio::time::sleep(self.delay).await;
        let found = self.inner.fetch(kind, namespace, name).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        found
    }
}

/// Holds every lookup until `n` of them are in flight at once.
pub struct BarrierResolver {
    inner: FakeResolver,
    barrier: Barrier,
}

impl BarrierResolver {
    pub fn new(inner: FakeResolver, n: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(n),
        }
    }
}

impl ResourceResolver for BarrierResolver {
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<KubeResource> {
        self.barrier.wait().await;
        self.inner.fetch(kind, namespace, name).await
    }
}

const MEETING_DEADLINE: Duration = Duration::from_secs(2);

/// Meeting point of a usage read and a lookup for the same mount. Each side
/// announces itself and waits for the other one, up to a deadline.
#[derive(Default)]
pub struct Rendezvous {
    usage_started: AtomicBool,
    lookup_started: AtomicBool,
}

/// Usage read that only completes once the lookup has started.
pub struct RendezvousUsage {
    pub inner: FixedUsage,
    pub meeting: Arc<Rendezvous>,
}

impl UsageSource for RendezvousUsage {
    fn usage(&self, path: &Path) -> Result<DiskUsage> {
        self.meeting.usage_started.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + MEETING_DEADLINE;
        while !self.meeting.lookup_started.load(Ordering::SeqCst) {
            if Instant::now() > deadline {
                return Err(ExporterError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "lookup never started",
                )));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.inner.usage(path)
    }
}

/// Lookup that only completes once the usage read has started.
pub struct RendezvousResolver {
    pub inner: FakeResolver,
    pub meeting: Arc<Rendezvous>,
}

impl ResourceResolver for RendezvousResolver {
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<KubeResource> {
        self.meeting.lookup_started.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + MEETING_DEADLINE;
        while !self.meeting.usage_started.load(Ordering::SeqCst) {
            if Instant::now() > deadline {
                return Err(ExporterError::ResourceNotFound {
                    kind,
                    name: name.to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        self.inner.fetch(kind, namespace, name).await
    }
}

pub fn gce_pv(name: &str, claim: Option<(&str, &str)>, labels: serde_json::Value) -> serde_json::Value {
    let mut spec = json!({
        "gcePersistentDisk": {"pdName": format!("gke-cluster-dyn-{}", name), "fsType": "ext4"}
    });
    if let Some((namespace, claim_name)) = claim {
        spec["claimRef"] = json!({"kind": "PersistentVolumeClaim", "namespace": namespace, "name": claim_name});
    }
    json!({
        "kind": "PersistentVolume",
        "metadata": {"name": name, "labels": labels},
        "spec": spec
    })
}

pub fn pvc(namespace: &str, name: &str, labels: serde_json::Value) -> serde_json::Value {
    json!({
        "kind": "PersistentVolumeClaim",
        "metadata": {"name": name, "namespace": namespace, "labels": labels},
        "spec": {"volumeName": PV_NAME}
    })
}
