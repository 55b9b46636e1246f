//! Test doubles for the wallet and messenger collaborators.
#![allow(dead_code)]

use async_trait::async_trait;
use bazaar_crypto::KeyRing;
use bazaar_trade::{
    InMemoryTradeStore, Offer, PaymentMethod, Role, Trade, TradeContext, TradeMessenger,
    TradeServices, WalletService,
};
use bazaar_types::{
    BazaarError, ChangeOutput, InputsAndChangeOutput, NodeAddress, PublicKey, RawInput, Result,
    TradeMessage, Transaction, TxId,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

/// Wallet double with a controllable chain height and a broadcast log.
pub struct FakeWallet {
    height_tx: watch::Sender<u64>,
    pub_key: PublicKey,
    broadcasts: Mutex<Vec<TxId>>,
    confirmed: Mutex<HashSet<TxId>>,
}

impl FakeWallet {
    pub fn new(height: u64) -> Arc<Self> {
        let (height_tx, _) = watch::channel(height);
        Arc::new(Self {
            height_tx,
            pub_key: PublicKey::from_bytes([9u8; 32]),
            broadcasts: Mutex::new(Vec::new()),
            confirmed: Mutex::new(HashSet::new()),
        })
    }

    pub fn set_height(&self, height: u64) {
        self.height_tx.send_replace(height);
    }

    pub async fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().await.len()
    }

    pub async fn mark_confirmed(&self, tx_id: TxId) {
        self.confirmed.lock().await.insert(tx_id);
    }
}

#[async_trait]
impl WalletService for FakeWallet {
    async fn best_chain_height(&self) -> u64 {
        *self.height_tx.borrow()
    }

    async fn trade_wallet_pub_key(&self) -> PublicKey {
        self.pub_key
    }

    async fn create_deposit_inputs(&self, amount: u64) -> Result<InputsAndChangeOutput> {
        Ok(InputsAndChangeOutput {
            raw_inputs: vec![RawInput {
                parent_tx_id: TxId::new(b"funding"),
                output_index: 0,
                value: amount,
            }],
            change_output: Some(ChangeOutput {
                value: 1_000,
                address: "change-addr".into(),
            }),
        })
    }

    async fn sign_and_publish_deposit(
        &self,
        contract_hash: [u8; 32],
        buyer_inputs: Vec<RawInput>,
        seller_inputs: Vec<RawInput>,
        _buyer_pub_key: PublicKey,
        _seller_pub_key: PublicKey,
        _arbitrator_pub_key: PublicKey,
    ) -> Result<Transaction> {
        if buyer_inputs.is_empty() || seller_inputs.is_empty() {
            return Err(BazaarError::Wallet("missing deposit inputs".into()));
        }
        let mut raw = b"deposit".to_vec();
        raw.extend_from_slice(&contract_hash);
        Ok(Transaction::new(raw))
    }

    async fn create_payout_tx(
        &self,
        deposit_tx: &Transaction,
        lock_time_height: u64,
    ) -> Result<Transaction> {
        let mut raw = deposit_tx.raw.clone();
        raw.extend_from_slice(b"payout");
        Ok(Transaction::new(raw).with_lock_time(lock_time_height))
    }

    async fn broadcast_tx(&self, tx: &Transaction) -> Result<Transaction> {
        self.broadcasts.lock().await.push(tx.id);
        self.confirmed.lock().await.insert(tx.id);
        Ok(tx.clone())
    }

    async fn is_confirmed(&self, tx_id: &TxId) -> bool {
        self.confirmed.lock().await.contains(tx_id)
    }

    async fn wait_for_height(&self, height: u64) -> Result<u64> {
        let mut rx = self.height_tx.subscribe();
        loop {
            let current = *rx.borrow();
            if current >= height {
                return Ok(current);
            }
            rx.changed()
                .await
                .map_err(|_| BazaarError::Wallet("height watch closed".into()))?;
        }
    }
}

/// Messenger double pushing outbound messages onto a channel the test (or
/// the counterparty's pump) consumes.
pub struct ChannelMessenger {
    tx: mpsc::UnboundedSender<TradeMessage>,
}

impl ChannelMessenger {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TradeMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl TradeMessenger for ChannelMessenger {
    async fn send(&self, message: TradeMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| BazaarError::Network("messenger channel closed".into()))
    }
}

pub fn test_offer() -> Offer {
    Offer {
        id: "offer-1".into(),
        payment_method: PaymentMethod::new("SEPA", 144),
        lock_time_delta: 10,
    }
}

pub struct Party {
    pub ctx: TradeContext,
    pub wallet: Arc<FakeWallet>,
    pub store: Arc<InMemoryTradeStore>,
    pub outbound: mpsc::UnboundedReceiver<TradeMessage>,
}

/// Build one party's trade context wired to fakes.
pub fn party(role: Role, amount: Option<u64>, height: u64) -> Party {
    let own_keys = KeyRing::generate();
    let peer_keys = KeyRing::generate();

    let wallet = FakeWallet::new(height);
    let store = Arc::new(InMemoryTradeStore::new());
    let (messenger, outbound) = ChannelMessenger::new();

    let trade = Trade::new(
        "trade-1",
        role,
        amount,
        test_offer(),
        NodeAddress::new("localhost", 8012),
        peer_keys.pub_key_ring(),
    );

    let services = Arc::new(TradeServices {
        wallet: wallet.clone(),
        messenger,
        store: store.clone(),
    });

    let mut ctx = TradeContext::new(trade, own_keys.pub_key_ring(), services);
    ctx.process.arbitrator_pub_key = Some(PublicKey::from_bytes([7u8; 32]));
    Party {
        ctx,
        wallet,
        store,
        outbound,
    }
}
