pub mod alpaca;
pub mod lifecycle;
pub mod orchestrator;
pub mod pnl;
pub mod schedule;

pub use alpaca::AlpacaClient;
pub use lifecycle::{Engine, EngineHandle};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use pnl::{compute_profit_loss, profit_loss};
pub use schedule::{Clock, ManualClock, SessionSchedule, SessionScheduler, SystemClock};
