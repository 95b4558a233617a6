//! Business logic services.
//!
//! Services orchestrate the configuration, cache and authorities.

mod reconcile;

pub use reconcile::{PlayerPhase, PlayerState, PlayerStateReconciler};
