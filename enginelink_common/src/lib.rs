//! Common primitives shared among the enginelink crates.

#[cfg(any(test, feature = "test-utils"))]
mod test_utils;
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;

pub mod retry;
pub use retry::*;

pub mod time;
