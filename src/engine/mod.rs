//! Decision engine: pure evaluators plus the tick handlers that apply their
//! results to the store.

pub mod classifier;
pub mod confirmation;
pub mod exit;
pub mod regime;
pub mod session;
