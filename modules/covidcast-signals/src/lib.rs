//! Time-shifted aggregation of covidcast signals and long/wide pivoting.
//!
//! Pure in-memory transforms over [`covidcast_common::SignalTable`]s: no I/O
//! happens here apart from the explicit writers in [`write`].

pub mod aggregate;
pub mod key;
pub mod pivot;
pub mod shift;
pub mod table;
pub mod write;

pub use aggregate::{aggregate, aggregate_signal, aggregate_signals, Aggregate, SignalShifts, Shifts};
pub use key::SignalKey;
pub use pivot::{to_long, to_wide};
pub use shift::shift_values;
pub use table::{LongRow, LongTable, WideRow, WideTable};
