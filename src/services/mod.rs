pub mod alerts;
pub mod balances;
pub mod instructions;
pub mod movements;
pub mod thresholds;

pub use alerts::{Alert, AlertService};
pub use balances::BalanceService;
pub use instructions::InstructionService;
pub use movements::MovementService;
pub use thresholds::ThresholdService;
