//! Timing primitives shared by operations, strategies, and the executor.

pub mod poller;
pub mod sleeper;

pub use poller::{PollError, Poller};
pub use sleeper::precise_sleep;
