//! Domain data access.
//!
//! - raw file loading + label merge (`loader`)
//! - per-city split, time ordering, and gap filling (`clean`)

pub mod clean;
pub mod loader;

pub use clean::*;
pub use loader::*;
