use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use super::reconciler::Reconciler;
use crate::config::{DomainConfig, Settings};
use crate::dns::{create_provider, Credentials};
use crate::error::Error;
use crate::ip::{IpLookup, MirrorResolver};
use crate::secrets::CredentialStore;

/// Owns the per-domain workers and the channel that tells them to stop.
pub struct Supervisor {
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<(String, JoinHandle<()>)>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            workers: Vec::new(),
        }
    }

    pub fn spawn(&mut self, reconciler: Reconciler) {
        let domain = reconciler.domain().to_string();
        let span = info_span!("worker", domain = %domain);
        let shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(reconciler.run(shutdown_rx).instrument(span));
        self.workers.push((domain, handle));
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Signals every worker to stop and waits for all of them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        for (domain, handle) in self.workers {
            if let Err(e) = handle.await {
                error!("Worker for {} ended abnormally: {}", domain, e);
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

/// Credentials from the config entry, else from the credential store.
pub fn resolve_credentials(entry: &DomainConfig, store: &CredentialStore) -> Result<Credentials> {
    if let (Some(username), Some(token)) = (&entry.username, &entry.token) {
        return Ok(Credentials {
            username: username.clone(),
            token: token.clone(),
        });
    }

    match store.get(&entry.domain)? {
        Some(credentials) => Ok(credentials),
        None => Err(Error::config(format!(
            "no credentials for {}. Set username/token in the config, NAME_USER/NAME_TOKEN, or run 'namecom-ddns set-key {}'",
            entry.domain, entry.domain
        ))
        .into()),
    }
}

/// Builds one reconciler per configured domain. Any configuration problem is
/// returned before a single worker starts.
pub fn build_reconcilers(
    settings: &Settings,
    store: &CredentialStore,
    ip: Arc<dyn IpLookup>,
) -> Result<Vec<Reconciler>> {
    settings.validate()?;

    settings
        .domains
        .iter()
        .map(|entry| -> Result<Reconciler> {
            let credentials = resolve_credentials(entry, store)?;
            let provider = create_provider(credentials, entry.dev)?;

            Ok(Reconciler::new(
                entry.clone(),
                entry.interval(&settings.daemon),
                provider,
                ip.clone(),
            )
            .with_retry(settings.daemon.retry.clone())
            .with_create_missing(settings.daemon.create_missing))
        })
        .collect()
}

pub async fn run(settings: Settings, config_dir: &Path) -> Result<()> {
    let store = CredentialStore::new(config_dir.join("credentials.toml"));
    let ip: Arc<dyn IpLookup> = Arc::new(MirrorResolver::new(settings.daemon.ip_mirrors.clone())?);

    let reconcilers = build_reconcilers(&settings, &store, ip)?;

    let mut supervisor = Supervisor::new();
    for reconciler in reconcilers {
        info!("Detected configuration for {}", reconciler.domain());
        supervisor.spawn(reconciler);
    }

    info!("Daemon started. Managing {} domain(s)", supervisor.len());

    if let Err(e) = wait_for_shutdown().await {
        error!("Error waiting for shutdown signal: {}", e);
    }

    info!("Shutdown signal received, stopping workers");
    supervisor.shutdown().await;
    info!("All workers stopped");

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
