//! Component construction.

use std::sync::Arc;

use anyhow::Result;
use nc_01_peer_crawler::{
    CrawlerEngine, Listener, LocalIdentity, LookupSource, TcpStatusSession,
};
use nc_02_peer_store::{InMemoryServingStore, InMemoryTransientStore, ServingStore, TransientStore};
use nc_03_dataset_sync::{EvictionDaemon, SyncDaemon};
use shared_types::{SystemTimeSource, TimeSource};
use tracing::info;

use super::config::{CrawlerNodeConfig, StorageBackend, StorageSection};

/// The two stores shared by the engine and the daemons.
#[derive(Clone)]
pub struct Stores {
    pub transient: Arc<dyn TransientStore>,
    pub serving: Arc<dyn ServingStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            transient: Arc::new(InMemoryTransientStore::new()),
            serving: Arc::new(InMemoryServingStore::new()),
        }
    }
}

/// Open the configured backend.
pub fn open_stores(storage: &StorageSection) -> Result<Stores> {
    match storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory peer stores");
            Ok(Stores::in_memory())
        }
        StorageBackend::Rocksdb => open_rocksdb(storage),
    }
}

#[cfg(feature = "rocksdb")]
fn open_rocksdb(storage: &StorageSection) -> Result<Stores> {
    use anyhow::Context;
    use nc_02_peer_store::{RocksDbConfig, RocksDbServingStore, RocksDbTransientStore};

    let transient = RocksDbConfig {
        sync_writes: storage.sync_writes,
        ..RocksDbConfig::at(&storage.transient_path)
    };
    let serving = RocksDbConfig {
        sync_writes: storage.sync_writes,
        ..RocksDbConfig::at(&storage.serving_path)
    };
    info!(
        transient = %storage.transient_path.display(),
        serving = %storage.serving_path.display(),
        "Opening RocksDB peer stores"
    );
    Ok(Stores {
        transient: Arc::new(RocksDbTransientStore::open(transient).context("opening transient store")?),
        serving: Arc::new(RocksDbServingStore::open(serving).context("opening serving store")?),
    })
}

#[cfg(not(feature = "rocksdb"))]
fn open_rocksdb(_storage: &StorageSection) -> Result<Stores> {
    anyhow::bail!("storage.backend = \"rocksdb\" requires building with the `rocksdb` feature")
}

/// Every long-lived component of a crawler process.
pub struct CrawlerContainer {
    pub identity: Arc<LocalIdentity>,
    pub discovery: Arc<LookupSource>,
    pub listener: Listener,
    pub engine: Arc<CrawlerEngine>,
    pub sync: SyncDaemon,
    pub eviction: EvictionDaemon,
    pub stores: Stores,
}

impl CrawlerContainer {
    /// Build with the configured stores and the wall clock.
    pub async fn build(config: &CrawlerNodeConfig) -> Result<Self> {
        let stores = open_stores(&config.storage)?;
        Self::with_stores(config, stores, Arc::new(SystemTimeSource)).await
    }

    /// Build around existing stores and clock.
    pub async fn with_stores(
        config: &CrawlerNodeConfig,
        stores: Stores,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self> {
        config.validate()?;

        let identity = Arc::new(match &config.network.node_key {
            Some(key) => LocalIdentity::from_hex(key)?,
            None => {
                info!("No node key configured, generating one");
                LocalIdentity::generate()
            }
        });

        let handshake = Arc::new(config.handshake_config()?);
        let discovery = Arc::new(LookupSource::with_bootnodes(
            identity.node_id(),
            config.lookup_config(),
            config.bootnodes()?,
        ));

        let listener = Listener::bind(
            &config.network.listen_addr,
            Arc::clone(&identity),
            Arc::clone(&handshake),
            discovery.clone(),
        )
        .await?;
        let listen_port = listener.local_addr()?.port();

        let session = Arc::new(TcpStatusSession::new(
            Arc::clone(&identity),
            handshake,
            Some(listen_port),
        ));
        let engine = Arc::new(CrawlerEngine::new(
            session,
            discovery.clone(),
            Arc::clone(&stores.transient),
            Arc::clone(&clock),
            config.crawler_config(),
        ));
        let sync = SyncDaemon::new(
            Arc::clone(&stores.transient),
            Arc::clone(&stores.serving),
            config.sync_config(),
        );
        let eviction = EvictionDaemon::new(Arc::clone(&stores.serving), clock, config.eviction_config());

        info!(
            node_id = %identity.node_id(),
            listen_port,
            bootnodes = discovery.len(),
            "Crawler components ready"
        );

        Ok(Self {
            identity,
            discovery,
            listener,
            engine,
            sync,
            eviction,
            stores,
        })
    }

    /// `enode://` URL other crawlers can use as a bootnode.
    pub fn enode(&self) -> Result<String> {
        let addr = self.listener.local_addr()?;
        Ok(format!("enode://{}@{}", self.identity.public_key_hex(), addr))
    }
}
