//! Idle detection for Realm.
//!
//! Two pieces, both independent of what a "connection" is:
//!
//! - [`ActivityTracker`]: last-seen instant per key, and the query
//!   "which keys have been quiet for longer than X?"
//! - [`SweepScheduler`]: a fixed-interval timer that tells its owner
//!   when the next sweep is due.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside an actor's `tokio::select!` loop,
//! so a sweep is just another turn of that loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         _ = scheduler.wait_for_sweep() => {
//!             for key in tracker.idle(now, threshold) { /* close it */ }
//!         }
//!     }
//! }
//! ```

mod scheduler;
mod tracker;

pub use scheduler::{ReaperConfig, SweepInfo, SweepScheduler};
pub use tracker::ActivityTracker;
