//! Tasks both role pipelines use.

use crate::context::TradeContext;
use crate::fee;
use crate::task::{TaskResult, TradeTask};
use crate::trade::TradeState;
use async_trait::async_trait;
use tracing::{debug, info};

/// Select our funding inputs and change output for the deposit tx.
pub struct CreateDepositTxInputs;

#[async_trait]
impl TradeTask for CreateDepositTxInputs {
    fn name(&self) -> &'static str {
        "CreateDepositTxInputs"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(trade_amount) = ctx.trade.amount else {
            return TaskResult::failed("trade amount is not set");
        };

        let funding_amount = fee::deposit_funding_amount(trade_amount);
        let result = match ctx
            .services
            .wallet
            .create_deposit_inputs(funding_amount)
            .await
        {
            Ok(r) => r,
            Err(e) => return TaskResult::Failed(e),
        };

        ctx.process.my_raw_inputs = result.raw_inputs;
        ctx.process.my_change_output = result.change_output;
        ctx.process.my_trade_wallet_pub_key =
            Some(ctx.services.wallet.trade_wallet_pub_key().await);

        TaskResult::Complete
    }
}

/// Compute the dispute-window heights from the current chain height and the
/// offer's maximum trade period.
pub struct InitWaitPeriodForOpenDispute;

#[async_trait]
impl TradeTask for InitWaitPeriodForOpenDispute {
    fn name(&self) -> &'static str {
        "InitWaitPeriodForOpenDispute"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let height = ctx.services.wallet.best_chain_height().await;
        let max_trade_period = ctx.trade.offer.payment_method.max_trade_period;

        ctx.trade.open_dispute_height = height + max_trade_period;
        ctx.trade.check_payment_height = height + max_trade_period / 2;

        debug!(
            trade_id = %ctx.trade.id,
            open_dispute_height = ctx.trade.open_dispute_height,
            check_payment_height = ctx.trade.check_payment_height,
            "Dispute window initialized"
        );
        TaskResult::Complete
    }
}

/// Broadcast the payout tx once the trade's lock time is reached.
///
/// Waits for the wallet's height notification when the chain is not there
/// yet. If the payout is already confirmed on-chain the step is satisfied
/// without re-broadcasting, so repeated invocations broadcast at most once.
pub struct BroadcastAfterLockTime;

#[async_trait]
impl TradeTask for BroadcastAfterLockTime {
    fn name(&self) -> &'static str {
        "BroadcastAfterLockTime"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        let Some(payout_tx) = ctx.trade.payout_tx.clone() else {
            return TaskResult::failed("payout tx missing at BroadcastAfterLockTime");
        };

        let wallet = &ctx.services.wallet;
        let height = wallet.best_chain_height().await;
        let lock_time = ctx.trade.lock_time_height;
        debug!(
            trade_id = %ctx.trade.id,
            chain_height = height,
            lock_time = lock_time,
            "Checking lock time"
        );

        if lock_time != 0 && height < lock_time {
            match wallet.wait_for_height(lock_time).await {
                Ok(reached) => {
                    debug!(trade_id = %ctx.trade.id, height = reached, "Lock time height reached")
                }
                Err(e) => return TaskResult::Failed(e),
            }
        }

        if wallet.is_confirmed(&payout_tx.id).await {
            info!(
                trade_id = %ctx.trade.id,
                tx = %payout_tx.id,
                "Payout tx already confirmed, skipping broadcast"
            );
            ctx.trade.advance_state(TradeState::PayoutPublished);
            return TaskResult::Complete;
        }

        match wallet.broadcast_tx(&payout_tx).await {
            Ok(tx) => {
                info!(trade_id = %ctx.trade.id, tx = %tx.id, "Payout tx broadcast");
                ctx.trade.advance_state(TradeState::PayoutPublished);
                TaskResult::Complete
            }
            Err(e) => TaskResult::Failed(e),
        }
    }
}

/// Final step of a successful trade.
pub struct CompleteTrade;

#[async_trait]
impl TradeTask for CompleteTrade {
    fn name(&self) -> &'static str {
        "CompleteTrade"
    }

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult {
        ctx.trade.advance_state(TradeState::Completed);
        info!(trade_id = %ctx.trade.id, "Trade completed");
        TaskResult::Complete
    }
}
