pub mod amount;
pub mod config;
pub mod csv;
pub mod events;
pub mod ledger;
pub mod model;
pub mod purchase;
pub mod reward;

pub use amount::Amount;
pub use config::EngineConfig;
pub use events::{EngineEvent, EventBus};
pub use ledger::{Balance, Ledger, LedgerError};
pub use model::{ContributionRecord, ContributionType, ScopeId, TransactionType, UserId};
pub use purchase::{PurchaseOrchestrator, PurchaseResult};
pub use reward::{RewardEngine, RewardError};
