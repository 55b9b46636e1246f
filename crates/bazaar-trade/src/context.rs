use crate::messenger::TradeMessenger;
use crate::process_model::ProcessModel;
use crate::store::TradeStore;
use crate::trade::{Contract, Trade};
use crate::wallet::WalletService;
use bazaar_types::{BazaarError, PubKeyRing, Result};
use std::sync::Arc;

/// Collaborators a task pipeline calls out to.
pub struct TradeServices {
    pub wallet: Arc<dyn WalletService>,
    pub messenger: Arc<dyn TradeMessenger>,
    pub store: Arc<dyn TradeStore>,
}

/// Everything one task sequence operates on: the trade aggregate, the
/// transient process model, our own announced keys and the collaborators.
pub struct TradeContext {
    pub trade: Trade,
    pub process: ProcessModel,
    pub own_pub_key_ring: PubKeyRing,
    pub services: Arc<TradeServices>,
}

impl TradeContext {
    pub fn new(
        trade: Trade,
        own_pub_key_ring: PubKeyRing,
        services: Arc<TradeServices>,
    ) -> Self {
        Self {
            trade,
            process: ProcessModel::default(),
            own_pub_key_ring,
            services,
        }
    }

    /// The contract both parties commit to, with key rings assigned by
    /// role.
    pub fn contract(&self) -> Result<Contract> {
        let amount = self
            .trade
            .amount
            .ok_or_else(|| BazaarError::Trade("trade amount is not set".into()))?;

        let (buyer_keys, seller_keys) = match self.trade.role {
            crate::trade::Role::Buyer => (self.own_pub_key_ring, self.trade.peer_pub_key_ring),
            crate::trade::Role::Seller => (self.trade.peer_pub_key_ring, self.own_pub_key_ring),
        };

        Ok(Contract {
            trade_id: self.trade.id.clone(),
            amount,
            payment_method_id: self.trade.offer.payment_method.id.clone(),
            buyer_pub_key_ring: buyer_keys,
            seller_pub_key_ring: seller_keys,
        })
    }
}
