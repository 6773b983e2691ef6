//! 对手 AI：固定优先级的决策策略与回合驱动。

pub mod driver;
pub mod policy;

pub use driver::{AiConfig, AiDifficulty, OpponentDriver, TurnReport};
pub use policy::{decide, decide_for};
