//! # PV Disk Usage Exporter
//!
//! A Prometheus exporter for the disk usage of Kubernetes PersistentVolume
//! mounts on a node.
//!
//! ## Overview
//!
//! Every scrape of `/metrics`:
//!
//! - lists the node's mounts, as seen through the host root bind mount
//! - keeps the mounts the kubelet created for PersistentVolumes (or all
//!   host mounts when configured so)
//! - reads each mount's usage while looking up its PersistentVolume and
//!   PersistentVolumeClaim for identifying labels
//! - renders the result in the Prometheus text format
//!
//! ## Quick Start
//!
//! ```no_run
//! use pv_disk_usage_exporter::{
//!     client::KubeClient, collector::Collector, config::Settings, mounts::ProcMounts,
//!     server::start_server, usage::Statvfs,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load(Some("config/default.toml"))?;
//!
//!     let kube = Arc::new(KubeClient::new(settings.kube.clone())?);
//!     let collector = Collector::new(
//!         ProcMounts::new(&settings.collect),
//!         Statvfs,
//!         kube,
//!         &settings.collect,
//!     );
//!
//!     start_server(&settings.exporter.listen_address, collector).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! The exporter can be configured via:
//! - TOML configuration file
//! - Environment variables (e.g. `PV_DISK_USAGE_EXPORTER__COLLECT__HOST_ROOT`)
//! - Command-line arguments
//!
//! See [`config::Settings`] for details.
//!
//! ## Modules
//!
//! - [`client`] - Kubernetes API client for PersistentVolumes and claims
//! - [`collector`] - Per-scrape collection across mounts
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling
//! - [`filter`] - PersistentVolume mountpoint matching and mount selection
//! - [`labels`] - Volume identity labels
//! - [`metrics`] - Metric catalog and text rendering
//! - [`mounts`] - Mount table enumeration
//! - [`server`] - HTTP server for exposing metrics
//! - [`usage`] - Filesystem usage statistics

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod filter;
pub mod labels;
pub mod metrics;
pub mod mounts;
pub mod server;
pub mod usage;

pub use error::{ExporterError, Result};
