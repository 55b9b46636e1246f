//! Buyer-side tasks: assemble and publish the deposit tx from both parties'
//! inputs, report the payment, take delivery of the finalized payout tx.

use crate::context::TradeContext;
use crate::task::{TaskResult, TradeTask};
use crate::trade::TradeState;
use async_trait::async_trait;
use bazaar_types::{TradeMessage, TradeMessageBody};
use tracing::{debug, info};

/// Store the seller's funding inputs in the process model.
pub struct ProcessDepositInputs;

#[async_trait]
impl TradeTask for ProcessDepositInputs {
    fn name(&self) -> &'static str {
        "ProcessDepositInputs"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(TradeMessage {
            body:
                TradeMessageBody::DepositInputs {
                    raw_inputs,
                    change_output,
                    trade_wallet_pub_key,
                },
            ..
        }) = ctx.process.trade_message.take()
        else {
            return TaskResult::failed("expected DepositInputs message");
        };

        if raw_inputs.is_empty() {
            return TaskResult::failed("peer sent no deposit inputs");
        }

        ctx.process.trading_peer.raw_inputs = raw_inputs;
        ctx.process.trading_peer.change_output = change_output;
        ctx.process.trading_peer.trade_wallet_pub_key = Some(trade_wallet_pub_key);
        ctx.trade.advance_state(TradeState::DepositInputsExchanged);
        TaskResult::Complete
    }
}

/// Hash the contract, build the full deposit tx from both parties' inputs,
/// counter-sign and publish it, and record the publishing height.
pub struct SignAndPublishDepositTx;

#[async_trait]
impl TradeTask for SignAndPublishDepositTx {
    fn name(&self) -> &'static str {
        "SignAndPublishDepositTx"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let contract = match ctx.contract() {
            Ok(c) => c,
            Err(e) => return TaskResult::Failed(e),
        };
        let contract_hash = match contract.hash() {
            Ok(h) => h,
            Err(e) => return TaskResult::Failed(e),
        };
        debug!(
            trade_id = %ctx.trade.id,
            contract = %contract.as_json().unwrap_or_default(),
            "Contract finalized"
        );
        ctx.trade.contract_hash = Some(contract_hash);

        let Some(buyer_pub_key) = ctx.process.my_trade_wallet_pub_key else {
            return TaskResult::failed("own trade wallet pub key missing");
        };
        let Some(seller_pub_key) = ctx.process.trading_peer.trade_wallet_pub_key else {
            return TaskResult::failed("peer trade wallet pub key missing");
        };
        let Some(arbitrator_pub_key) = ctx.process.arbitrator_pub_key else {
            return TaskResult::failed("arbitrator pub key missing");
        };

        let wallet = &ctx.services.wallet;
        match wallet
            .sign_and_publish_deposit(
                contract_hash,
                ctx.process.my_raw_inputs.clone(),
                ctx.process.trading_peer.raw_inputs.clone(),
                buyer_pub_key,
                seller_pub_key,
                arbitrator_pub_key,
            )
            .await
        {
            Ok(deposit_tx) => {
                info!(trade_id = %ctx.trade.id, tx = %deposit_tx.id, "Deposit tx published");
                ctx.trade.deposit_tx = Some(deposit_tx);
                ctx.trade.deposit_publish_height = wallet.best_chain_height().await;
                ctx.trade.advance_state(TradeState::DepositPublished);
                TaskResult::Complete
            }
            Err(e) => TaskResult::Failed(e),
        }
    }
}

/// Tell the seller the deposit tx is on the chain.
pub struct SendDepositPublished;

#[async_trait]
impl TradeTask for SendDepositPublished {
    fn name(&self) -> &'static str {
        "SendDepositPublished"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(deposit_tx) = ctx.trade.deposit_tx.clone() else {
            return TaskResult::failed("deposit tx missing at SendDepositPublished");
        };

        let message = TradeMessage::new(
            ctx.trade.id.clone(),
            TradeMessageBody::DepositPublished { deposit_tx },
        );
        match ctx.services.messenger.send(message).await {
            Ok(()) => TaskResult::Complete,
            Err(e) => TaskResult::Failed(e),
        }
    }
}

/// The buyer marked the payment as started.
pub struct SetPaymentStarted;

#[async_trait]
impl TradeTask for SetPaymentStarted {
    fn name(&self) -> &'static str {
        "SetPaymentStarted"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        ctx.trade.advance_state(TradeState::PaymentStarted);
        TaskResult::Complete
    }
}

/// Notify the seller that the payment is on its way.
pub struct SendPaymentStarted;

#[async_trait]
impl TradeTask for SendPaymentStarted {
    fn name(&self) -> &'static str {
        "SendPaymentStarted"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let message = TradeMessage::new(ctx.trade.id.clone(), TradeMessageBody::PaymentStarted);
        match ctx.services.messenger.send(message).await {
            Ok(()) => TaskResult::Complete,
            Err(e) => TaskResult::Failed(e),
        }
    }
}

/// Take delivery of the finalized payout tx; its lock time is authoritative
/// for the broadcast step.
pub struct ProcessPayoutFinalized;

#[async_trait]
impl TradeTask for ProcessPayoutFinalized {
    fn name(&self) -> &'static str {
        "ProcessPayoutFinalized"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(TradeMessage {
            body: TradeMessageBody::PayoutFinalized { payout_tx },
            ..
        }) = ctx.process.trade_message.take()
        else {
            return TaskResult::failed("expected PayoutFinalized message");
        };

        ctx.trade.lock_time_height = payout_tx.lock_time_height;
        ctx.trade.payout_tx = Some(payout_tx);
        ctx.trade.advance_state(TradeState::PaymentReceived);
        TaskResult::Complete
    }
}
