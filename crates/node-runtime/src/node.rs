//! # Site Node
//!
//! Wires the sequencer to the filesystem adapters and the local consumers.
//!
//! ## Lifecycle
//!
//! 1. `open` - lock the data directory, open store and roster, seed peers
//! 2. `bootstrap` - recover held messages and drain them inline
//! 3. `go_online` - hand consumer work to the tokio runtime
//! 4. `run_periodic` - periodic checks until shutdown

use crate::adapters::{DataDirLock, FsMessageStore, FsSiteRoster};
use crate::config::NodeConfig;
use crate::handlers::LoggingConsumer;
use anyhow::{Context, Result};
use ism_sequencer::adapters::{ConsumerSet, Ed25519Credentials, InlineExecutor, TokioExecutor};
use ism_sequencer::{AdmissionStats, IsmExchangeApi, SequencerPorts, SequencerService};
use shared_types::{SiteId, SiteRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// The sequencer as assembled by the node.
pub type NodeService = SequencerService<FsMessageStore, FsSiteRoster, Ed25519Credentials>;

/// Outcome of the start-up drain.
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    /// Re-admission of held messages.
    pub recovered: AdmissionStats,
    /// Messages applied inline before going online.
    pub applied: usize,
}

/// One running site.
pub struct SiteNode {
    site_id: SiteId,
    periodic: Duration,
    service: NodeService,
    store: Arc<FsMessageStore>,
    roster: Arc<FsSiteRoster>,
    _lock: DataDirLock,
}

impl SiteNode {
    /// Opens the node's storage and builds the sequencer in bootstrap mode.
    pub fn open(config: &NodeConfig) -> Result<Self> {
        let data_dir = &config.storage.data_dir;
        let lock = DataDirLock::acquire(data_dir)
            .with_context(|| format!("Failed to lock data directory {:?}", data_dir))?;

        let store = Arc::new(FsMessageStore::open(data_dir).context("Failed to open message store")?);
        let roster = Arc::new(FsSiteRoster::open(data_dir).context("Failed to open site roster")?);

        let signing_key = config.signing_key()?;
        let site_id = SiteId(config.site_id);
        let credentials = Arc::new(Ed25519Credentials::new(site_id, signing_key));

        // Our own messages echoed back by peers must authenticate, so they
        // are dropped as local-origin instead of counted as unknown senders.
        let mut seeded = 0;
        let local = SiteRecord::active(site_id, credentials.public_key());
        for record in std::iter::once(Ok(local)).chain(config.peers.iter().map(|p| p.to_record())) {
            if roster.seed(record?)? {
                seeded += 1;
            }
        }
        if seeded > 0 {
            info!("Seeded {} roster entries", seeded);
        }

        let consumers = ConsumerSet::new(
            Arc::new(LoggingConsumer::new("membership")),
            Arc::new(LoggingConsumer::new("identifiers")),
            Arc::new(LoggingConsumer::new("repository")),
        );
        let ports = SequencerPorts::new(Arc::clone(&store), Arc::clone(&roster), credentials, consumers);
        let service = SequencerService::new(config.sequencer.clone(), ports, Arc::new(InlineExecutor));

        Ok(Self {
            site_id,
            periodic: Duration::from_secs(config.periodic_secs.max(1)),
            service,
            store,
            roster,
            _lock: lock,
        })
    }

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    pub fn service(&self) -> &NodeService {
        &self.service
    }

    pub fn store(&self) -> &FsMessageStore {
        &self.store
    }

    pub fn roster(&self) -> &FsSiteRoster {
        &self.roster
    }

    /// Recovers held messages and applies everything that is ready, inline.
    pub fn bootstrap(&self) -> Result<BootstrapReport> {
        let recovered = self.service.recover().context("Recovery failed")?;
        let mut applied = 0;
        while self.service.dispatch_one()?.completed_inline() {
            applied += 1;
        }
        info!(
            "Bootstrap drain complete: {} applied, recovered {}",
            applied, recovered
        );
        Ok(BootstrapReport { recovered, applied })
    }

    /// Leaves bootstrap mode; consumer work moves onto `handle`.
    pub fn go_online(&self, handle: Handle) -> Result<()> {
        self.service
            .go_online(Arc::new(TokioExecutor::new(handle)))
            .context("Failed to leave bootstrap mode")
    }

    /// One `periodic_check`, off the async workers: it lists and reads the
    /// held store under the engine lock.
    pub async fn periodic_once(&self) {
        let service = self.service.clone();
        match tokio::task::spawn_blocking(move || service.periodic_check()).await {
            Ok(Ok(report)) => {
                if !report.stalled.is_empty() {
                    warn!("{} sites stalled: {:?}", report.stalled.len(), report.stalled);
                }
            }
            Ok(Err(e)) => error!("Periodic check failed: {}", e),
            Err(e) => error!("Periodic check task failed: {}", e),
        }
    }

    /// Runs `periodic_check` every interval until `shutdown` flips to true.
    pub async fn run_periodic(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.periodic);
        // The first tick fires immediately; bootstrap just did that work.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.periodic_once().await,
                _ = shutdown.changed() => {
                    info!("Periodic task stopping");
                    return;
                }
            }
        }
    }
}
