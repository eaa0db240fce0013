//! Timeline placement of background tracks
//!
//! Two pure stages run after probing:
//! - reconciliation of probed durations with user hints
//! - overlap resolution across the full set of placed tracks

pub mod reconcile;
pub mod resolve;

pub use reconcile::reconcile;
pub use resolve::resolve;
