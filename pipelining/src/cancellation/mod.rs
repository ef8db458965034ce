//! Cooperative cancellation for pipeline runs.
//!
//! A run checks its token only between stages; a pipe that is already
//! running is never interrupted.

mod token;

pub use token::CancellationToken;
