pub mod context;
pub mod fee;
pub mod messenger;
pub mod process_model;
pub mod protocol;
pub mod store;
pub mod task;
pub mod tasks;
pub mod trade;
pub mod wallet;

pub use context::{TradeContext, TradeServices};
pub use messenger::{P2PMessenger, TradeMessenger};
pub use process_model::{ProcessModel, TradingPeer};
pub use protocol::{spawn_protocol, ProtocolConfig, TradeEvent, TradeFailure, TradeHandle};
pub use store::{InMemoryTradeStore, TradeStore};
pub use task::{RunOutcome, TaskResult, TaskRunner, TradeTask};
pub use trade::{Contract, Offer, PaymentMethod, Role, Trade, TradeState};
pub use wallet::WalletService;
