use bazaar_types::{NodeAddress, PubKeyRing, Result, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which side of the exchange this node plays.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Role {
    Buyer,
    Seller,
}

/// Strict forward progression of a trade, plus the dispute branch reachable
/// from any non-terminal state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TradeState {
    ContractAgreed,
    DepositInputsExchanged,
    DepositPublished,
    PaymentStarted,
    PaymentReceived,
    PayoutPublished,
    Completed,
    Disputed,
}

impl TradeState {
    fn ordinal(&self) -> u8 {
        match self {
            TradeState::ContractAgreed => 0,
            TradeState::DepositInputsExchanged => 1,
            TradeState::DepositPublished => 2,
            TradeState::PaymentStarted => 3,
            TradeState::PaymentReceived => 4,
            TradeState::PayoutPublished => 5,
            TradeState::Completed => 6,
            TradeState::Disputed => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeState::Completed | TradeState::Disputed)
    }
}

/// How the fiat/altcoin side of the trade is settled, and how long the
/// settlement may take, expressed in blocks.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub max_trade_period: u64,
}

impl PaymentMethod {
    pub fn new(id: impl Into<String>, max_trade_period: u64) -> Self {
        Self {
            id: id.into(),
            max_trade_period,
        }
    }
}

/// The accepted offer this trade was created from.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub payment_method: PaymentMethod,
    /// Blocks between deposit publication and payout lock time.
    pub lock_time_delta: u64,
}

/// The terms both parties sign off on. Its canonical JSON is hashed into
/// the deposit transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contract {
    pub trade_id: String,
    pub amount: u64,
    pub payment_method_id: String,
    pub buyer_pub_key_ring: PubKeyRing,
    pub seller_pub_key_ring: PubKeyRing,
}

impl Contract {
    pub fn as_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn hash(&self) -> Result<[u8; 32]> {
        Ok(blake3::hash(self.as_json()?.as_bytes()).into())
    }
}

/// Aggregate root for one exchange. Owned exclusively by its protocol actor
/// for its lifetime and persisted after every state change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub role: Role,
    /// Negotiated amount; tasks depending on it fail explicitly while it is
    /// unknown.
    pub amount: Option<u64>,
    pub offer: Offer,
    pub peer_address: NodeAddress,
    pub peer_pub_key_ring: PubKeyRing,
    pub deposit_tx: Option<Transaction>,
    pub payout_tx: Option<Transaction>,
    /// Chain height at which the deposit tx was published (as locally
    /// observed).
    pub deposit_publish_height: u64,
    /// Target chain height before which the payout must not be broadcast.
    pub lock_time_height: u64,
    /// Height at which a dispute may be opened.
    pub open_dispute_height: u64,
    /// Earlier checkpoint prompting a payment-received check.
    pub check_payment_height: u64,
    pub contract_hash: Option<[u8; 32]>,
    state: TradeState,
}

impl Trade {
    pub fn new(
        id: impl Into<String>,
        role: Role,
        amount: Option<u64>,
        offer: Offer,
        peer_address: NodeAddress,
        peer_pub_key_ring: PubKeyRing,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            amount,
            offer,
            peer_address,
            peer_pub_key_ring,
            deposit_tx: None,
            payout_tx: None,
            deposit_publish_height: 0,
            lock_time_height: 0,
            open_dispute_height: 0,
            check_payment_height: 0,
            contract_hash: None,
            state: TradeState::ContractAgreed,
        }
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    /// Advance to a later state. Backward requests are logged and ignored:
    /// there is no backward transition in the protocol.
    pub fn advance_state(&mut self, new_state: TradeState) -> bool {
        if self.state.is_terminal() || new_state.ordinal() <= self.state.ordinal() {
            warn!(
                trade_id = %self.id,
                current = ?self.state,
                requested = ?new_state,
                "Ignoring non-forward state transition"
            );
            return false;
        }
        info!(
            trade_id = %self.id,
            from = ?self.state,
            to = ?new_state,
            "Trade state advanced"
        );
        self.state = new_state;
        true
    }

    /// Move to the dispute branch. Permitted from any non-terminal state.
    pub fn open_dispute(&mut self) -> bool {
        if self.state.is_terminal() {
            warn!(trade_id = %self.id, state = ?self.state, "Cannot dispute a terminal trade");
            return false;
        }
        info!(trade_id = %self.id, from = ?self.state, "Dispute opened");
        self.state = TradeState::Disputed;
        true
    }

    /// Cancellation is only permitted before the deposit tx is irreversibly
    /// published.
    pub fn can_cancel(&self) -> bool {
        self.state.ordinal() < TradeState::DepositPublished.ordinal()
    }
}
