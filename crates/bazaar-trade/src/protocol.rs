//! Per-trade state machine. One actor owns the trade and its process model
//! for their whole lifetime; every stimulus (inbound message, local
//! trigger, chain-height notification) arrives as an event on its queue and
//! is handled by running a task sequence on that single sequencer.

use crate::context::TradeContext;
use crate::task::{RunOutcome, TaskRunner, TradeTask};
use crate::tasks::{buyer, seller, shared};
use crate::trade::{Role, TradeState};
use bazaar_types::{TradeMessage, TradeMessageBody};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Stimuli a trade protocol reacts to.
#[derive(Debug)]
pub enum TradeEvent {
    /// Verified inbound message from the counterparty.
    Message(TradeMessage),
    /// Local trigger: the buyer started the payment.
    PaymentStarted,
    /// Local trigger: the seller confirmed the payment arrived.
    PaymentReceived,
    /// The chain passed the open-dispute height.
    DisputeHeightReached(u64),
    /// A party requests arbitration.
    RequestDispute,
    /// Abandon the trade; only honored before the deposit is published.
    Cancel,
}

/// Reported on the failure channel when a task sequence aborts. The trade
/// remains at its last successfully reached state; any retry must be
/// triggered explicitly by the protocol layer or the user.
#[derive(Clone, Debug)]
pub struct TradeFailure {
    pub trade_id: String,
    pub task: &'static str,
    pub cause: String,
}

#[derive(Default)]
pub struct ProtocolConfig {
    /// Name of a task to fail before its main logic runs (test fault
    /// injection through the runner's intercept hook).
    pub intercept_task: Option<String>,
}

/// Handle for feeding events to a running trade protocol.
pub struct TradeHandle {
    pub trade_id: String,
    events: mpsc::UnboundedSender<TradeEvent>,
    pub join: JoinHandle<()>,
}

impl TradeHandle {
    pub fn send(&self, event: TradeEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// A cloned sender for message routers feeding this protocol.
    pub fn events_sender(&self) -> mpsc::UnboundedSender<TradeEvent> {
        self.events.clone()
    }
}

/// Spawn the protocol actor for a trade. Returns the event handle and the
/// stream of task failures.
pub fn spawn_protocol(
    ctx: TradeContext,
    config: ProtocolConfig,
) -> (TradeHandle, mpsc::UnboundedReceiver<TradeFailure>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (failure_tx, failure_rx) = mpsc::unbounded_channel();
    let trade_id = ctx.trade.id.clone();

    let protocol = TradeProtocol {
        ctx,
        failure_tx,
        event_tx: event_tx.clone(),
        intercept_task: config.intercept_task,
        dispute_watcher_spawned: false,
    };
    let join = tokio::spawn(protocol.run(event_rx));

    (
        TradeHandle {
            trade_id,
            events: event_tx,
            join,
        },
        failure_rx,
    )
}

struct TradeProtocol {
    ctx: TradeContext,
    failure_tx: mpsc::UnboundedSender<TradeFailure>,
    event_tx: mpsc::UnboundedSender<TradeEvent>,
    intercept_task: Option<String>,
    dispute_watcher_spawned: bool,
}

impl TradeProtocol {
    async fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<TradeEvent>) {
        // The seller opens the exchange by assembling and sending its
        // funding inputs; the buyer waits for them.
        if self.ctx.trade.role == Role::Seller {
            let tasks: Vec<Box<dyn TradeTask>> = vec![
                Box::new(shared::CreateDepositTxInputs),
                Box::new(seller::SendDepositInputs),
                Box::new(shared::InitWaitPeriodForOpenDispute),
            ];
            self.run_sequence(tasks).await;
        }

        while let Some(event) = event_rx.recv().await {
            match event {
                TradeEvent::Cancel => {
                    if self.ctx.trade.can_cancel() {
                        info!(trade_id = %self.ctx.trade.id, "Trade cancelled");
                        if let Err(e) = self.ctx.services.store.remove(&self.ctx.trade.id).await {
                            warn!(error = %e, "Trade cleanup failed");
                        }
                        return;
                    }
                    warn!(
                        trade_id = %self.ctx.trade.id,
                        state = ?self.ctx.trade.state(),
                        "Cancel rejected, deposit already published"
                    );
                }
                TradeEvent::RequestDispute => self.open_dispute().await,
                TradeEvent::DisputeHeightReached(height) => {
                    info!(
                        trade_id = %self.ctx.trade.id,
                        height = height,
                        "Open-dispute height reached"
                    );
                    self.open_dispute().await;
                }
                other => {
                    if let Some(tasks) = self.dispatch(other) {
                        if self.run_sequence(tasks).await {
                            self.maybe_broadcast_payout().await;
                        }
                    }
                }
            }

            if self.ctx.trade.state().is_terminal() {
                info!(
                    trade_id = %self.ctx.trade.id,
                    state = ?self.ctx.trade.state(),
                    "Trade protocol finished"
                );
                return;
            }
        }
    }

    /// Select the task sequence for a stimulus, or `None` when it does not
    /// apply to this role.
    fn dispatch(&mut self, event: TradeEvent) -> Option<Vec<Box<dyn TradeTask>>> {
        match (self.ctx.trade.role, event) {
            (Role::Buyer, TradeEvent::Message(msg)) => match &msg.body {
                TradeMessageBody::DepositInputs { .. } => {
                    self.ctx.process.trade_message = Some(msg);
                    Some(vec![
                        Box::new(buyer::ProcessDepositInputs),
                        Box::new(shared::CreateDepositTxInputs),
                        Box::new(buyer::SignAndPublishDepositTx),
                        Box::new(buyer::SendDepositPublished),
                        Box::new(shared::InitWaitPeriodForOpenDispute),
                    ])
                }
                TradeMessageBody::PayoutFinalized { .. } => {
                    self.ctx.process.trade_message = Some(msg);
                    Some(vec![Box::new(buyer::ProcessPayoutFinalized)])
                }
                _ => {
                    warn!(
                        trade_id = %self.ctx.trade.id,
                        body = msg.body.name(),
                        "Unexpected message for buyer, ignored"
                    );
                    None
                }
            },
            (Role::Buyer, TradeEvent::PaymentStarted) => Some(vec![
                Box::new(buyer::SetPaymentStarted),
                Box::new(buyer::SendPaymentStarted),
            ]),
            (Role::Seller, TradeEvent::Message(msg)) => match &msg.body {
                TradeMessageBody::DepositPublished { .. } => {
                    self.ctx.process.trade_message = Some(msg);
                    Some(vec![Box::new(seller::ProcessDepositPublished)])
                }
                TradeMessageBody::PaymentStarted => {
                    self.ctx.process.trade_message = Some(msg);
                    Some(vec![Box::new(seller::ProcessPaymentStarted)])
                }
                _ => {
                    warn!(
                        trade_id = %self.ctx.trade.id,
                        body = msg.body.name(),
                        "Unexpected message for seller, ignored"
                    );
                    None
                }
            },
            (Role::Seller, TradeEvent::PaymentReceived) => Some(vec![
                Box::new(seller::SetPaymentReceived),
                Box::new(seller::CreatePayoutTx),
                Box::new(seller::SendPayoutFinalized),
            ]),
            (role, event) => {
                warn!(
                    trade_id = %self.ctx.trade.id,
                    role = ?role,
                    event = ?event,
                    "Event does not apply, ignored"
                );
                None
            }
        }
    }

    async fn run_sequence(&mut self, tasks: Vec<Box<dyn TradeTask>>) -> bool {
        let mut runner = TaskRunner::new(tasks);
        if let Some(name) = self.intercept_task.clone() {
            runner = runner.intercept_before(move |task| task == name);
        }

        let outcome = runner.run(&mut self.ctx).await;

        if let Err(e) = self.ctx.services.store.save(&self.ctx.trade).await {
            warn!(trade_id = %self.ctx.trade.id, error = %e, "Trade persistence failed");
        }

        match outcome {
            RunOutcome::Completed => {
                self.maybe_spawn_dispute_watcher();
                true
            }
            RunOutcome::Failed { task, cause } => {
                let _ = self.failure_tx.send(TradeFailure {
                    trade_id: self.ctx.trade.id.clone(),
                    task,
                    cause: cause.to_string(),
                });
                false
            }
        }
    }

    /// Once the payment is acknowledged and the payout tx is in hand, the
    /// timed broadcast runs as its own sequence. The acknowledged state is
    /// persisted before the pipeline parks on the lock time.
    async fn maybe_broadcast_payout(&mut self) {
        if self.ctx.trade.state() == TradeState::PaymentReceived
            && self.ctx.trade.payout_tx.is_some()
        {
            let tasks: Vec<Box<dyn TradeTask>> = vec![
                Box::new(shared::BroadcastAfterLockTime),
                Box::new(shared::CompleteTrade),
            ];
            self.run_sequence(tasks).await;
        }
    }

    /// Once the dispute window is known, watch the chain height from a side
    /// task. The notification is re-dispatched onto the actor queue, so the
    /// state change happens on the trade sequencer like any other.
    fn maybe_spawn_dispute_watcher(&mut self) {
        if self.dispute_watcher_spawned || self.ctx.trade.open_dispute_height == 0 {
            return;
        }
        self.dispute_watcher_spawned = true;

        let wallet = self.ctx.services.wallet.clone();
        let event_tx = self.event_tx.clone();
        let height = self.ctx.trade.open_dispute_height;
        let trade_id = self.ctx.trade.id.clone();
        tokio::spawn(async move {
            match wallet.wait_for_height(height).await {
                Ok(reached) => {
                    let _ = event_tx.send(TradeEvent::DisputeHeightReached(reached));
                }
                Err(e) => {
                    warn!(trade_id = %trade_id, error = %e, "Dispute height watch failed");
                }
            }
        });
    }

    async fn open_dispute(&mut self) {
        if self.ctx.trade.open_dispute() {
            if let Err(e) = self.ctx.services.store.save(&self.ctx.trade).await {
                warn!(trade_id = %self.ctx.trade.id, error = %e, "Trade persistence failed");
            }
        }
    }
}
