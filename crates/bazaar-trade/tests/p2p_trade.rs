//! Full exchange between two protocol actors talking over the P2P layer
//! instead of a test channel.

mod common;

use bazaar_crypto::KeyRing;
use bazaar_network::{MemoryHub, P2PService};
use bazaar_trade::{
    spawn_protocol, InMemoryTradeStore, P2PMessenger, ProtocolConfig, Role, Trade, TradeContext,
    TradeEvent, TradeHandle, TradeServices, TradeState, TradeStore,
};
use bazaar_types::{NodeAddress, PublicKey};
use common::FakeWallet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

struct P2PParty {
    handle: TradeHandle,
    wallet: Arc<FakeWallet>,
    store: Arc<InMemoryTradeStore>,
}

async fn p2p_party(
    hub: &Arc<MemoryHub>,
    port: u16,
    role: Role,
    own_keys: KeyRing,
    peer_port: u16,
    peer_keys: &KeyRing,
) -> P2PParty {
    let (transport, inbound) = hub.register(NodeAddress::new("localhost", port)).await;
    let service = P2PService::new(own_keys.clone(), transport);
    service.spawn_inbound_loop(inbound);

    let wallet = FakeWallet::new(1000);
    let store = Arc::new(InMemoryTradeStore::new());
    let peer_address = NodeAddress::new("localhost", peer_port);

    let messenger = Arc::new(P2PMessenger::new(
        service.clone(),
        peer_address.clone(),
        peer_keys.pub_key_ring(),
    ));
    let services = Arc::new(TradeServices {
        wallet: wallet.clone(),
        messenger,
        store: store.clone(),
    });

    let trade = Trade::new(
        "trade-1",
        role,
        Some(500_000),
        common::test_offer(),
        peer_address,
        peer_keys.pub_key_ring(),
    );
    let mut ctx = TradeContext::new(trade, own_keys.pub_key_ring(), services);
    ctx.process.arbitrator_pub_key = Some(PublicKey::from_bytes([7u8; 32]));

    let (handle, _failures) = spawn_protocol(ctx, ProtocolConfig::default());

    // Route this node's inbound trade messages onto the actor queue.
    let mut messages = service.subscribe_messages().await;
    let events = handle.events_sender();
    tokio::spawn(async move {
        while let Some(decrypted) = messages.recv().await {
            if decrypted.message.trade_id == "trade-1"
                && events.send(TradeEvent::Message(decrypted.message)).is_err()
            {
                break;
            }
        }
    });

    P2PParty {
        handle,
        wallet,
        store,
    }
}

async fn wait_for_state(store: &Arc<InMemoryTradeStore>, state: TradeState) {
    timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(Some(trade)) = store.load("trade-1").await {
                if trade.state() == state {
                    return;
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("trade never reached {:?}", state));
}

#[tokio::test]
async fn full_trade_over_the_p2p_overlay() {
    let hub = MemoryHub::new();
    let seller_keys = KeyRing::generate();
    let buyer_keys = KeyRing::generate();

    let buyer = p2p_party(&hub, 8012, Role::Buyer, buyer_keys.clone(), 8002, &seller_keys).await;
    let seller = p2p_party(&hub, 8002, Role::Seller, seller_keys, 8012, &buyer_keys).await;

    // Seller's opening inputs flow through the overlay; the buyer publishes
    // the deposit and reports back.
    wait_for_state(&buyer.store, TradeState::DepositPublished).await;
    wait_for_state(&seller.store, TradeState::DepositPublished).await;

    buyer.handle.send(TradeEvent::PaymentStarted);
    wait_for_state(&seller.store, TradeState::PaymentStarted).await;

    seller.handle.send(TradeEvent::PaymentReceived);
    wait_for_state(&buyer.store, TradeState::PaymentReceived).await;

    // Unlock the payout on both chains.
    seller.wallet.set_height(1010);
    buyer.wallet.set_height(1010);

    wait_for_state(&seller.store, TradeState::Completed).await;
    wait_for_state(&buyer.store, TradeState::Completed).await;

    assert_eq!(seller.wallet.broadcast_count().await, 1);
    assert_eq!(buyer.wallet.broadcast_count().await, 1);
}
