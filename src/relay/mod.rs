//! Relay engine
//!
//! [`forward`] moves chunks in one direction; [`relay_pair`] runs both
//! directions of a session as a single scope where either one ending stops
//! the other.

mod forward;
mod supervisor;

pub use forward::{forward, ForwardOutcome};
pub use supervisor::{relay_pair, Direction, RelayStats};
