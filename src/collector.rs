//! Per-scrape collection of disk usage and volume labels.
//!
//! Every included mount gets a future in which the usage read and the
//! label lookup run side by side. Both are awaited before they are
//! combined, so a failed lookup never discards a successful usage read.
//!
//! The per-mount futures are driven by the caller's task. Dropping the
//! collection future drops every pending lookup with it.

use crate::client::ResourceResolver;
use crate::config::CollectConfig;
use crate::error::{ExporterError, Result};
use crate::filter::MountFilter;
use crate::labels::{raw_mount_labels, LabelEnricher};
use crate::metrics::MetricSample;
use crate::mounts::{Mount, MountSource};
use crate::usage::UsageSource;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Collects samples for all included mounts.
pub struct Collector<M, U, R> {
    mounts: Arc<M>,
    usage: Arc<U>,
    enricher: LabelEnricher<R>,
    filter: MountFilter,
}

impl<M, U, R> Collector<M, U, R>
where
    M: MountSource,
    U: UsageSource,
    R: ResourceResolver,
{
    pub fn new(mounts: M, usage: U, resolver: Arc<R>, config: &CollectConfig) -> Self {
        Self {
            mounts: Arc::new(mounts),
            usage: Arc::new(usage),
            enricher: LabelEnricher::new(resolver),
            filter: MountFilter::new(&config.host_root, config.export_all_mounts),
        }
    }

    /// The mounts to export, in discovery order.
    pub async fn included_mounts(&self) -> Result<Vec<Mount>> {
        let source = Arc::clone(&self.mounts);
        let all = tokio::task::spawn_blocking(move || source.mounts()).await??;

        let included: Vec<Mount> = all
            .iter()
            .filter(|m| self.filter.include(m))
            .cloned()
            .collect();

        let kept: HashSet<&Mount> = included.iter().collect();
        let excluded: Vec<&Mount> = all.iter().filter(|m| !kept.contains(m)).collect();
        debug!(?included, ?excluded, "mounts filtered");

        Ok(included)
    }

    /// Collect samples, one list per included mount.
    ///
    /// A mount whose PersistentVolume cannot be resolved keeps its raw mount
    /// labels. Failing to list mounts or to read usage fails the collection.
    pub async fn collect(&self) -> Result<Vec<Vec<MetricSample>>> {
        let mounts = self.included_mounts().await?;
        info!("Collecting metrics for {} mounts", mounts.len());

        let pending: Vec<_> = mounts
            .into_iter()
            .map(|mount| {
                let span = info_span!("mount", mountpoint = %mount.mountpoint);
                let usage = Arc::clone(&self.usage);
                let enricher = self.enricher.clone();
                let host_root = self.filter.host_root().to_string();
                collect_mount(usage, enricher, host_root, mount).instrument(span)
            })
            .collect();

        join_all(pending).await.into_iter().collect()
    }
}

async fn collect_mount<U, R>(
    usage: Arc<U>,
    enricher: LabelEnricher<R>,
    host_root: String,
    mount: Mount,
) -> Result<Vec<MetricSample>>
where
    U: UsageSource,
    R: ResourceResolver,
{
    let raw_labels = raw_mount_labels(&mount, &host_root);
    let path = PathBuf::from(&mount.mountpoint);

    let read_usage = async move {
        let disk_usage = tokio::task::spawn_blocking(move || usage.usage(&path)).await??;
        Ok::<_, ExporterError>(disk_usage.samples(&raw_labels))
    };

    let (samples, labels) = tokio::join!(read_usage, enricher.labels_for(&mount));
    let mut samples = samples?;

    match labels {
        Ok(labels) => {
            for sample in &mut samples {
                sample.labels = labels.clone();
            }
        }
        Err(e) => {
            warn!("Could not get volume labels, keeping mount labels: {}", e);
        }
    }

    debug!(?samples, "metrics collected for mount");
    Ok(samples)
}
