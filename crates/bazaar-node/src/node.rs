use crate::config::NodeConfig;
use crate::logging;
use crate::tcp_transport::TcpTransport;
use bazaar_crypto::KeyRing;
use bazaar_network::{LifecycleEvent, P2PService, Transport};
use bazaar_types::NodeAddress;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Run a seed node: a plain store-and-relay peer other nodes bootstrap
/// from. Takes an optional listen address; port 0 picks one automatically.
pub async fn run_seed(config: NodeConfig, listen: NodeAddress) -> anyhow::Result<()> {
    let (transport, inbound_rx, lifecycle_rx) =
        TcpTransport::bind(&listen, config.network.max_connections).await?;
    logging::test_log(&format!("ADDRESS {}", transport.local_address()));

    let service = P2PService::new(KeyRing::generate(), transport.clone());
    service.spawn_inbound_loop(inbound_rx);
    spawn_lifecycle_logger(&service).await;
    service.start(lifecycle_rx);

    service
        .storage()
        .start_purge_task(Duration::from_secs(config.storage.purge_interval_secs));

    info!(address = %service.local_address(), "Seed node running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}

/// Run a regular peer: bind an automatic port, bootstrap from the given
/// seed node, then keep announcing ourselves.
pub async fn run_peer(config: NodeConfig, seed: NodeAddress) -> anyhow::Result<()> {
    let listen: NodeAddress = config.network.listen.parse()?;
    let (transport, inbound_rx, lifecycle_rx) =
        TcpTransport::bind(&listen, config.network.max_connections).await?;
    logging::test_log(&format!("ADDRESS {}", transport.local_address()));

    let service = P2PService::new(KeyRing::generate(), transport.clone());
    service.spawn_inbound_loop(inbound_rx);
    spawn_lifecycle_logger(&service).await;
    service.start(lifecycle_rx);

    service
        .storage()
        .start_purge_task(Duration::from_secs(config.storage.purge_interval_secs));

    match transport.connect(&seed).await {
        Ok(()) => {
            service.request_data(&seed).await?;
            service.announce().await?;
            transport.notify(LifecycleEvent::BootstrapComplete);
            service.start_announcement_task(Duration::from_secs(
                config.network.announcement_interval_secs,
            ));
        }
        Err(e) => {
            warn!(seed = %seed, error = %e, "Seed node unreachable");
            transport.notify(LifecycleEvent::NoSeedNodeAvailable);
        }
    }

    info!(address = %service.local_address(), "Peer running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}

/// Mirror lifecycle events to stdout in the testbed format.
async fn spawn_lifecycle_logger(service: &Arc<P2PService>) {
    let mut lifecycle = service.subscribe_lifecycle().await;
    tokio::spawn(async move {
        while let Some(event) = lifecycle.recv().await {
            logging::test_log(event.name());
        }
    });
}
