//! The fetch surface: per-request options, cancellation, and dispatch.

pub mod abort;
pub mod init;
pub(crate) mod pipeline;

pub use abort::{AbortController, AbortSignal, AbortWatch};
pub use init::{HeadersInit, RedirectMode, RequestInit};
