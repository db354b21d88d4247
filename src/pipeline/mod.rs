//! Change detection and delivery.
//!
//! - `correlate`: event prefixes and same-event collapsing
//! - `evict`: bounded retention of service tables
//! - `reconcile`: send, edit, or skip per record
//! - `pace`: minimum spacing between outbound calls
//! - `relay`: one polling cycle over all enabled sources
//! - `skip`: mark a source's backlog as seen

pub mod correlate;
pub mod evict;
pub mod pace;
pub mod reconcile;
pub mod relay;
pub mod skip;

pub use reconcile::{Decision, Reconciler};
pub use relay::{CycleReport, Relay, SourceReport, run_cycle};
pub use skip::skip_source;
