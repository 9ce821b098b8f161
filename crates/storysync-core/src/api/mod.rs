//! Remote API access for the Story App backend.
//!
//! This module provides:
//! - `RemoteApi`: the seam every engine component talks to the network through
//! - `ApiClient`: the reqwest-backed implementation
//! - `ApiError`: network and status failures
//!
//! Authenticated calls use a bearer token supplied by the foreground context.

pub mod client;
pub mod error;
pub mod remote;

pub use client::ApiClient;
pub use error::ApiError;
pub use remote::{RemoteApi, StorySubmission};
