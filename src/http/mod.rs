pub mod headers;
pub mod requestbody;
pub mod response;

// Re-exports for convenience
pub use headers::Headers;
pub use requestbody::RequestBody;
pub use response::Response;
