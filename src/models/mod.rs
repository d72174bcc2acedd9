//! Domain models shared across the decision engine, the store and the HTTP
//! surface.

pub mod position;
pub mod signal;
pub mod snapshot;

pub use position::{EntryKind, ExitKind, PendingSignal, Position, TradeRecord};
pub use signal::{Direction, Disposition, SignalType};
pub use snapshot::IndicatorSnapshot;
