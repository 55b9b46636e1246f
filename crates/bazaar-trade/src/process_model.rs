use bazaar_types::{ChangeOutput, PublicKey, RawInput, TradeMessage};

/// Transient per-trade execution context shared by all tasks in the
/// pipeline. Mutated only by tasks running under the trade's runner, on the
/// trade sequencer (single writer).
#[derive(Clone, Debug, Default)]
pub struct ProcessModel {
    /// Our collected raw funding inputs for the deposit tx.
    pub my_raw_inputs: Vec<RawInput>,
    pub my_change_output: Option<ChangeOutput>,
    pub my_trade_wallet_pub_key: Option<PublicKey>,
    pub arbitrator_pub_key: Option<PublicKey>,
    pub trading_peer: TradingPeer,
    /// The inbound message the current task sequence is processing.
    pub trade_message: Option<TradeMessage>,
}

/// Data received from the counterparty over the wire.
#[derive(Clone, Debug, Default)]
pub struct TradingPeer {
    pub raw_inputs: Vec<RawInput>,
    pub change_output: Option<ChangeOutput>,
    pub trade_wallet_pub_key: Option<PublicKey>,
}
