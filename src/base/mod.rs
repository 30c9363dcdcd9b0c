//! Base types and error handling.
//!
//! - [`NetError`]: the crate-wide error taxonomy
//! - [`LoadState`]: states a dispatched request moves through

pub mod context;
pub mod loadstate;
pub mod neterror;

pub use loadstate::LoadState;
pub use neterror::{BoxError, ErrorKind, NetError};

#[cfg(test)]
mod tests;
