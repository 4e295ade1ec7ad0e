//! Shared domain types.

pub mod frame;
pub mod types;

pub use frame::*;
pub use types::*;
