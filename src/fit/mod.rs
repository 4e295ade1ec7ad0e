//! Gradient-boosted forecaster.
//!
//! - depth-limited regression trees with exact split search (`tree`)
//! - squared-error gradient boosting over those trees (`gbdt`)
//! - chronological holdout evaluation on the log target (`eval`)

pub mod eval;
pub mod gbdt;
pub mod tree;

pub use eval::*;
pub use gbdt::*;
pub use tree::*;
