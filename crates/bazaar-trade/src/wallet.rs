use async_trait::async_trait;
use bazaar_types::{InputsAndChangeOutput, PublicKey, RawInput, Result, Transaction, TxId};

/// Consumed wallet collaborator. Key custody, script construction and
/// signing live behind this boundary; the trade engine only sequences the
/// calls.
///
/// Chain-height waits are futures: awaiting them inside a task suspends the
/// pipeline on the trade sequencer until the wallet reports the height.
#[async_trait]
pub trait WalletService: Send + Sync {
    /// The wallet's current view of the chain height.
    async fn best_chain_height(&self) -> u64;

    /// The public key the wallet contributes to the multi-signature script.
    async fn trade_wallet_pub_key(&self) -> PublicKey;

    /// Select raw inputs and change worth `amount` for the deposit tx.
    async fn create_deposit_inputs(&self, amount: u64) -> Result<InputsAndChangeOutput>;

    /// Build the multi-signature deposit tx from both parties' inputs,
    /// commit the contract hash, sign our half and publish it.
    #[allow(clippy::too_many_arguments)]
    async fn sign_and_publish_deposit(
        &self,
        contract_hash: [u8; 32],
        buyer_inputs: Vec<RawInput>,
        seller_inputs: Vec<RawInput>,
        buyer_pub_key: PublicKey,
        seller_pub_key: PublicKey,
        arbitrator_pub_key: PublicKey,
    ) -> Result<Transaction>;

    /// Construct and fully sign the payout tx spending the deposit, with
    /// the given lock time.
    async fn create_payout_tx(
        &self,
        deposit_tx: &Transaction,
        lock_time_height: u64,
    ) -> Result<Transaction>;

    /// Broadcast a fully signed transaction to the ledger network.
    async fn broadcast_tx(&self, tx: &Transaction) -> Result<Transaction>;

    /// Whether the tx is already confirmed on-chain.
    async fn is_confirmed(&self, tx_id: &TxId) -> bool;

    /// Resolve once the chain reaches `height`. Resolves immediately if it
    /// already has.
    async fn wait_for_height(&self, height: u64) -> Result<u64>;
}
