//! Configuration management for the disk usage exporter.
//!
//! Supports loading configuration from:
//! - TOML configuration files
//! - Environment variables (e.g. `PV_DISK_USAGE_EXPORTER__COLLECT__HOST_ROOT`)
//! - Command-line arguments (applied by the binary on top of the above)

use crate::error::{ExporterError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Kubernetes API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeConfig {
    /// API server base URL (e.g., "https://10.0.0.1:443")
    #[serde(default = "default_api_server")]
    pub api_server: String,

    /// Path of the bearer token file. A missing file means anonymous requests.
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,

    /// Path of the cluster CA bundle. Ignored when the file does not exist.
    #[serde(default = "default_ca_cert_path")]
    pub ca_cert_path: PathBuf,

    /// Namespace used for PersistentVolumeClaims whose claimRef has none
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Verify the API server certificate
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

/// Mount discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Export every host-rooted mount, not only PersistentVolume mounts
    #[serde(default)]
    pub export_all_mounts: bool,

    /// Prefix under which the host filesystem is visible to the exporter
    #[serde(default = "default_host_root")]
    pub host_root: String,

    /// Kernel mount table to read
    #[serde(default = "default_mounts_file")]
    pub mounts_file: PathBuf,

    /// Kernel filesystem type table, used to skip virtual filesystems
    #[serde(default = "default_filesystems_file")]
    pub filesystems_file: PathBuf,

    /// Report virtual filesystems (proc, tmpfs, ...) as well
    #[serde(default)]
    pub all_filesystems: bool,
}

/// Exporter specific settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExporterConfig {
    /// Address to listen on for metrics endpoint
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit human readable log lines instead of JSON
    #[serde(default)]
    pub log_human: bool,
}

/// Main configuration structure for the exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Exporter server configuration
    #[serde(default)]
    pub exporter: ExporterConfig,

    /// Mount discovery configuration
    #[serde(default)]
    pub collect: CollectConfig,

    /// Kubernetes API configuration
    #[serde(default)]
    pub kube: KubeConfig,
}

fn default_api_server() -> String {
    match (
        std::env::var("KUBERNETES_SERVICE_HOST"),
        std::env::var("KUBERNETES_SERVICE_PORT"),
    ) {
        (Ok(host), Ok(port)) if !host.is_empty() => {
            // IPv6 service hosts need brackets in the authority
            if host.contains(':') {
                format!("https://[{}]:{}", host, port)
            } else {
                format!("https://{}:{}", host, port)
            }
        }
        _ => "https://kubernetes.default.svc".to_string(),
    }
}

fn default_token_path() -> PathBuf {
    Path::new(SERVICE_ACCOUNT_DIR).join("token")
}

fn default_ca_cert_path() -> PathBuf {
    Path::new(SERVICE_ACCOUNT_DIR).join("ca.crt")
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_verify_tls() -> bool {
    true
}

fn default_host_root() -> String {
    "/rootfs".to_string()
}

fn default_mounts_file() -> PathBuf {
    PathBuf::from("/proc/self/mounts")
}

fn default_filesystems_file() -> PathBuf {
    PathBuf::from("/proc/filesystems")
}

fn default_listen_address() -> String {
    "0.0.0.0:9274".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            api_server: default_api_server(),
            token_path: default_token_path(),
            ca_cert_path: default_ca_cert_path(),
            default_namespace: default_namespace(),
            timeout_seconds: default_timeout(),
            verify_tls: default_verify_tls(),
        }
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            export_all_mounts: false,
            host_root: default_host_root(),
            mounts_file: default_mounts_file(),
            filesystems_file: default_filesystems_file(),
            all_filesystems: false,
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            log_level: default_log_level(),
            log_human: false,
        }
    }
}

impl Settings {
    /// Load configuration from a file and environment variables.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Optional path to configuration file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pv_disk_usage_exporter::config::Settings;
    ///
    /// let settings = Settings::load(Some("config/default.toml")).unwrap();
    /// ```
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PV_DISK_USAGE_EXPORTER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration settings.
    pub fn validate(&self) -> Result<()> {
        if self.collect.host_root.is_empty() {
            return Err(ExporterError::Config(config::ConfigError::Message(
                "collect.host_root cannot be empty".to_string(),
            )));
        }

        if self.kube.api_server.is_empty() {
            return Err(ExporterError::Config(config::ConfigError::Message(
                "kube.api_server cannot be empty".to_string(),
            )));
        }

        if self.kube.timeout_seconds == 0 {
            return Err(ExporterError::Config(config::ConfigError::Message(
                "kube.timeout_seconds must be greater than zero".to_string(),
            )));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exporter: ExporterConfig::default(),
            collect: CollectConfig::default(),
            kube: KubeConfig::default(),
        }
    }
}
