//! Seller-side tasks: provide deposit funding, acknowledge the payment and
//! hand the finalized payout tx to the buyer.

use crate::context::TradeContext;
use crate::task::{TaskResult, TradeTask};
use crate::trade::TradeState;
use async_trait::async_trait;
use bazaar_types::{TradeMessage, TradeMessageBody};
use tracing::info;

/// Transmit our funding inputs to the buyer, who builds the deposit tx.
pub struct SendDepositInputs;

#[async_trait]
impl TradeTask for SendDepositInputs {
    fn name(&self) -> &'static str {
        "SendDepositInputs"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(pub_key) = ctx.process.my_trade_wallet_pub_key else {
            return TaskResult::failed("own trade wallet pub key missing");
        };

        let message = TradeMessage::new(
            ctx.trade.id.clone(),
            TradeMessageBody::DepositInputs {
                raw_inputs: ctx.process.my_raw_inputs.clone(),
                change_output: ctx.process.my_change_output.clone(),
                trade_wallet_pub_key: pub_key,
            },
        );

        if let Err(e) = ctx.services.messenger.send(message).await {
            return TaskResult::Failed(e);
        }
        ctx.trade.advance_state(TradeState::DepositInputsExchanged);
        TaskResult::Complete
    }
}

/// Record the deposit tx the buyer published, and the height we saw it at.
pub struct ProcessDepositPublished;

#[async_trait]
impl TradeTask for ProcessDepositPublished {
    fn name(&self) -> &'static str {
        "ProcessDepositPublished"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(TradeMessage {
            body: TradeMessageBody::DepositPublished { deposit_tx },
            ..
        }) = ctx.process.trade_message.take()
        else {
            return TaskResult::failed("expected DepositPublished message");
        };

        ctx.trade.deposit_publish_height = ctx.services.wallet.best_chain_height().await;
        ctx.trade.deposit_tx = Some(deposit_tx);
        ctx.trade.advance_state(TradeState::DepositPublished);
        TaskResult::Complete
    }
}

/// The buyer reports having started the payment.
pub struct ProcessPaymentStarted;

#[async_trait]
impl TradeTask for ProcessPaymentStarted {
    fn name(&self) -> &'static str {
        "ProcessPaymentStarted"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(TradeMessage {
            body: TradeMessageBody::PaymentStarted,
            ..
        }) = ctx.process.trade_message.take()
        else {
            return TaskResult::failed("expected PaymentStarted message");
        };

        ctx.trade.advance_state(TradeState::PaymentStarted);
        TaskResult::Complete
    }
}

/// The seller confirmed the payment arrived.
pub struct SetPaymentReceived;

#[async_trait]
impl TradeTask for SetPaymentReceived {
    fn name(&self) -> &'static str {
        "SetPaymentReceived"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        ctx.trade.advance_state(TradeState::PaymentReceived);
        TaskResult::Complete
    }
}

/// Build and sign the payout tx spending the deposit, locked until the
/// offer's lock-time delta after deposit publication.
pub struct CreatePayoutTx;

#[async_trait]
impl TradeTask for CreatePayoutTx {
    fn name(&self) -> &'static str {
        "CreatePayoutTx"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(deposit_tx) = ctx.trade.deposit_tx.clone() else {
            return TaskResult::failed("deposit tx missing at CreatePayoutTx");
        };

        let lock_time_height = ctx.trade.deposit_publish_height + ctx.trade.offer.lock_time_delta;
        match ctx
            .services
            .wallet
            .create_payout_tx(&deposit_tx, lock_time_height)
            .await
        {
            Ok(payout_tx) => {
                info!(
                    trade_id = %ctx.trade.id,
                    tx = %payout_tx.id,
                    lock_time = lock_time_height,
                    "Payout tx created"
                );
                ctx.trade.lock_time_height = lock_time_height;
                ctx.trade.payout_tx = Some(payout_tx);
                TaskResult::Complete
            }
            Err(e) => TaskResult::Failed(e),
        }
    }
}

/// Deliver the finalized payout tx to the buyer.
pub struct SendPayoutFinalized;

#[async_trait]
impl TradeTask for SendPayoutFinalized {
    fn name(&self) -> &'static str {
        "SendPayoutFinalized"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(payout_tx) = ctx.trade.payout_tx.clone() else {
            return TaskResult::failed("payout tx missing at SendPayoutFinalized");
        };

        let message = TradeMessage::new(
            ctx.trade.id.clone(),
            TradeMessageBody::PayoutFinalized { payout_tx },
        );
        match ctx.services.messenger.send(message).await {
            Ok(()) => TaskResult::Complete,
            Err(e) => TaskResult::Failed(e),
        }
    }
}
