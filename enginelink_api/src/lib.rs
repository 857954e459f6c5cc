//! Generic HTTP client for a user-hosted generation engine.
//!
//! Every call goes through one request path with bounded latency and bounded
//! retry, normalizing all failure modes into [`ApiError`]. The transport is a
//! trait seam so the connection logic can be exercised without a network.

pub mod constants;

mod client;
mod error;
mod notify;
mod transport;

pub use client::*;
pub use error::*;
pub use notify::*;
pub use transport::*;

#[cfg(test)]
pub(crate) mod tests {
    // Execute once before any tests are run
    #[ctor::ctor]
    fn _setup() {
        enginelink_common::logger();
    }
}
