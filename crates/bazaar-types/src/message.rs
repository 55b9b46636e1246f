use crate::tx::{ChangeOutput, RawInput, Transaction};
use crate::version::ProtocolVersion;
use crate::PublicKey;
use serde::{Deserialize, Serialize};

/// A protocol message exchanged between the two trading parties.
///
/// Trade messages travel either as a direct message to a connected peer or
/// sealed inside a mailbox entry when the counterparty is offline. The
/// version tag is checked before the body is interpreted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeMessage {
    pub version: ProtocolVersion,
    pub trade_id: String,
    pub body: TradeMessageBody,
}

impl TradeMessage {
    pub fn new(trade_id: impl Into<String>, body: TradeMessageBody) -> Self {
        Self {
            version: ProtocolVersion::current(),
            trade_id: trade_id.into(),
            body,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TradeMessageBody {
    /// Seller's funding inputs for the multi-signature deposit tx.
    DepositInputs {
        raw_inputs: Vec<RawInput>,
        change_output: Option<ChangeOutput>,
        trade_wallet_pub_key: PublicKey,
    },
    /// Buyer has signed and published the deposit tx.
    DepositPublished { deposit_tx: Transaction },
    /// Buyer has started the fiat/altcoin payment.
    PaymentStarted,
    /// Seller acknowledges the payment and delivers the fully signed payout
    /// tx, ready for broadcast once lock time passes.
    PayoutFinalized { payout_tx: Transaction },
}

impl TradeMessageBody {
    /// Short name used in logs and task failure causes.
    pub fn name(&self) -> &'static str {
        match self {
            TradeMessageBody::DepositInputs { .. } => "DepositInputs",
            TradeMessageBody::DepositPublished { .. } => "DepositPublished",
            TradeMessageBody::PaymentStarted => "PaymentStarted",
            TradeMessageBody::PayoutFinalized { .. } => "PayoutFinalized",
        }
    }
}
