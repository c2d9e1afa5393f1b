//! Kubernetes API client for resolving PersistentVolumes and claims.
//!
//! This module provides a read-only client for the two object kinds the
//! exporter needs, and the [`ResourceResolver`] seam the label enricher
//! is written against.

use crate::config::KubeConfig;
use crate::error::{ExporterError, Result};
use reqwest::{Certificate, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Kubernetes object kinds the exporter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    PersistentVolume,
    PersistentVolumeClaim,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::PersistentVolume => f.write_str("PersistentVolume"),
            ResourceKind::PersistentVolumeClaim => f.write_str("PersistentVolumeClaim"),
        }
    }
}

/// Object metadata.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Reference from a PersistentVolume to the claim bound to it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectReference {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// GCE persistent disk backend of a PersistentVolume.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcePersistentDisk {
    #[serde(rename = "pdName")]
    pub pd_name: String,
}

/// The `spec` fields read from PersistentVolumes. Claims leave them empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceSpec {
    #[serde(rename = "claimRef", default)]
    pub claim_ref: Option<ObjectReference>,
    #[serde(rename = "gcePersistentDisk", default)]
    pub gce_persistent_disk: Option<GcePersistentDisk>,
}

/// A PersistentVolume or PersistentVolumeClaim snapshot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KubeResource {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<ResourceSpec>,
}

impl KubeResource {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Object labels; an object without labels yields an empty map.
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.metadata.labels.clone().unwrap_or_default()
    }

    pub fn claim_ref(&self) -> Option<&ObjectReference> {
        self.spec.as_ref().and_then(|s| s.claim_ref.as_ref())
    }

    pub fn gce_persistent_disk(&self) -> Option<&GcePersistentDisk> {
        self.spec.as_ref().and_then(|s| s.gce_persistent_disk.as_ref())
    }
}

/// Fetches Kubernetes objects by kind and name.
///
/// `namespace` is only meaningful for namespaced kinds. Any failure is
/// reported as [`ExporterError::ResourceNotFound`].
pub trait ResourceResolver: Send + Sync + 'static {
    fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> impl Future<Output = Result<KubeResource>> + Send;
}

/// Kubernetes API client.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    config: KubeConfig,
    auth_header: Option<String>,
}

impl KubeClient {
    /// Create a new Kubernetes API client.
    ///
    /// The bearer token and CA bundle are read from the configured paths
    /// when the files exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pv_disk_usage_exporter::client::KubeClient;
    /// use pv_disk_usage_exporter::config::KubeConfig;
    ///
    /// let client = KubeClient::new(KubeConfig::default()).unwrap();
    /// ```
    pub fn new(config: KubeConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(!config.verify_tls);

        if config.ca_cert_path.exists() {
            let pem = std::fs::read(&config.ca_cert_path)?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
            debug!("Loaded cluster CA from {}", config.ca_cert_path.display());
        }

        let auth_header = if config.token_path.exists() {
            let token = std::fs::read_to_string(&config.token_path)?;
            Some(format!("Bearer {}", token.trim()))
        } else {
            warn!(
                "No service account token at {}, using anonymous requests",
                config.token_path.display()
            );
            None
        };

        Ok(Self {
            client: builder.build()?,
            config,
            auth_header,
        })
    }

    fn url(&self, kind: ResourceKind, namespace: Option<&str>, name: &str) -> String {
        let endpoint = self.config.api_server.trim_end_matches('/');
        match kind {
            ResourceKind::PersistentVolume => {
                format!("{}/api/v1/persistentvolumes/{}", endpoint, name)
            }
            ResourceKind::PersistentVolumeClaim => format!(
                "{}/api/v1/namespaces/{}/persistentvolumeclaims/{}",
                endpoint,
                namespace.unwrap_or(&self.config.default_namespace),
                name
            ),
        }
    }

    async fn get(&self, url: &str) -> Result<Option<KubeResource>> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status()?;
        let body = response.text().await?;

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ExporterError::ParseError(format!("Failed to parse {}: {}", url, e)))
    }
}

impl ResourceResolver for KubeClient {
    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<KubeResource> {
        let url = self.url(kind, namespace, name);
        debug!("Fetching {} from: {}", kind, url);

        let not_found = || ExporterError::ResourceNotFound {
            kind,
            name: name.to_string(),
        };

        match self.get(&url).await {
            Ok(Some(resource)) => Ok(resource),
            Ok(None) => Err(not_found()),
            Err(e) => {
                warn!("Failed to fetch {} {}: {}", kind, name, e);
                Err(not_found())
            }
        }
    }
}
