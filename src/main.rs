use anyhow::Result;
use clap::Parser;
use pv_disk_usage_exporter::{
    client::KubeClient, collector::Collector, config::Settings, mounts::ProcMounts,
    server::start_server, usage::Statvfs,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prometheus disk usage metrics exporter for Kubernetes PersistentVolumes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Interface to listen on
    #[arg(long, env = "LISTEN_HOST")]
    listen_host: Option<String>,

    /// Port number to listen on
    #[arg(long, env = "LISTEN_PORT")]
    listen_port: Option<u16>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logging messages for humans. Messages are emitted as JSON lines by default
    #[arg(long)]
    log_human: bool,

    /// Export every mount under the host root, not only PersistentVolumes
    #[arg(long)]
    export_all_mounts: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if self.listen_host.is_some() || self.listen_port.is_some() {
            let (default_host, default_port) = settings
                .exporter
                .listen_address
                .rsplit_once(':')
                .unwrap_or(("0.0.0.0", "9274"));
            let host = self.listen_host.as_deref().unwrap_or(default_host);
            let port = self
                .listen_port
                .map(|p| p.to_string())
                .unwrap_or_else(|| default_port.to_string());
            settings.exporter.listen_address = format!("{}:{}", host, port);
        }
        if let Some(level) = &self.log_level {
            settings.exporter.log_level = level.clone();
        }
        if self.log_human {
            settings.exporter.log_human = true;
        }
        if self.export_all_mounts {
            settings.collect.export_all_mounts = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration
    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);

    // Initialize logging
    init_logging(&settings.exporter.log_level, settings.exporter.log_human)?;

    info!("Starting PV disk usage exporter");
    info!("Kubernetes API: {}", settings.kube.api_server);
    info!("Host root: {}", settings.collect.host_root);
    info!("Export all mounts: {}", settings.collect.export_all_mounts);

    let kube = Arc::new(KubeClient::new(settings.kube.clone())?);
    info!("Kubernetes client initialized");

    let collector = Collector::new(
        ProcMounts::new(&settings.collect),
        Statvfs,
        kube,
        &settings.collect,
    );

    if let Err(e) = start_server(&settings.exporter.listen_address, collector).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

/// Initialize structured logging with tracing.
fn init_logging(log_level: &str, for_humans: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if for_humans {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}
