//! Bounded-concurrency executor driving a plan tree's actions to terminal
//! states, and the synch-side event stream observers can subscribe to.

mod error;
mod events;
mod executor;

pub use error::{ExecError, ExecResult};
pub use events::SynchEvent;
pub use executor::Executor;
