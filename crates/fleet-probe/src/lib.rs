//! fleet-probe — device reachability checks for Fleetwatch.
//!
//! A device is `online` if it answers HTTP, or failing that, answers a
//! ping. Batches fan out one task per device so a round costs about one
//! probe timeout regardless of fleet size.
//!
//! # Architecture
//!
//! ```text
//! BatchCoordinator::check_many(key → address)
//!   ├── phase 1: HttpProbe per device, all concurrent
//!   │     any HTTP status (2xx..5xx, redirects included) → online
//!   ├── phase 2: ReachabilityProbe over the HTTP failures, capped by a semaphore
//!   │     public domains (.com/.org/.net) are never pinged
//!   └── key → online | offline, one entry per input key
//! ```
//!
//! Probes sit behind the [`Probe`] trait; [`StatusChecker`] owns one HTTP
//! and one reachability probe and applies the fallback policy for a single
//! device.

pub mod address;
pub mod batch;
pub mod checker;
pub mod http_probe;
pub mod reachability;

pub use address::{host_of, normalize};
pub use batch::BatchCoordinator;
pub use checker::{Probe, ProbeFuture, StatusChecker};
pub use http_probe::HttpProbe;
pub use reachability::ReachabilityProbe;
