//! HTTP gateway for the Vigil browser pool.
//!
//! The adapter's only job is to obtain a handle from the pool and invoke
//! its fetch operation; transport concerns stay out of the execution core.

pub mod server;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use server::{router, start_gateway, GatewayState};
