use crate::trade::Trade;
use async_trait::async_trait;
use bazaar_types::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// External trade persistence boundary. The protocol saves after every
/// state change and removes the record on completion/cancellation cleanup.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn save(&self, trade: &Trade) -> Result<()>;

    async fn load(&self, trade_id: &str) -> Result<Option<Trade>>;

    async fn remove(&self, trade_id: &str) -> Result<()>;
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct InMemoryTradeStore {
    trades: RwLock<HashMap<String, Trade>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn save(&self, trade: &Trade) -> Result<()> {
        self.trades
            .write()
            .await
            .insert(trade.id.clone(), trade.clone());
        Ok(())
    }

    async fn load(&self, trade_id: &str) -> Result<Option<Trade>> {
        Ok(self.trades.read().await.get(trade_id).cloned())
    }

    async fn remove(&self, trade_id: &str) -> Result<()> {
        self.trades.write().await.remove(trade_id);
        Ok(())
    }
}
