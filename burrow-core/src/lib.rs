pub mod config;
pub mod dirbust;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod frontier;
pub mod hosts;
pub mod ledger;
pub mod lists;
pub mod pool;
pub mod seeder;
pub mod tracker;

pub use config::{Config, StatusFilter};
pub use engine::{Engine, EngineHandle, Finding, RunSummary, Stats};
pub use error::{EngineError, Result};
