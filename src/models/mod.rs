// Data models for plans, sessions and the adaptation ledger

pub mod adaptation_history;
pub mod cycle;
pub mod recalculation;
pub mod session_change;
pub mod training_plan;
pub mod training_session;

pub use adaptation_history::*;
pub use cycle::*;
pub use recalculation::*;
pub use session_change::*;
pub use training_plan::*;
pub use training_session::*;
