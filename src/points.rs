//! Per-actor point scores with periodic decay and threshold actions.
//!
//! ```text
//! Action::Points ──add_points──┐            decay worker (recv_timeout loop)
//!                              v                      │
//!                 records: Mutex<HashMap<ActorId,     │ decay_tick
//!                          Arc<Mutex<PointRecord>>>> ◀┘
//!                              │
//!                              │ score moved across a level?
//!                              v
//!             Threshold { ascending | descending actions }
//!             run on a synthetic context, listener `POINTS`
//! ```
//!
//! ## Invariants
//!
//! - Scores never go below zero.
//! - Each (actor, threshold) pair is either below or above; a crossing fires
//!   its actions once, and only a crossing back can fire the other side.
//! - Ascending crossings fire lowest level first, descending highest first.
//! - Threshold actions never see the point manager, so they cannot feed
//!   back into scores.
//!
//! ## Locking
//!
//! The record map lock is never held while waiting on a record lock except
//! during pruning, and no code path takes the map lock while holding a record
//! lock. Threshold actions run after every lock is released.

#[path = "points/manager.rs"]
mod manager;
#[path = "points/record.rs"]
mod record;
#[path = "points/threshold.rs"]
mod threshold;

pub use manager::PointManager;
pub use record::PointRecord;
pub use threshold::{Crossing, Threshold};
