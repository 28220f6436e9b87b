//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`poller`] - Statistics and manual poll trigger
//! - [`system`] - Health, events, OpenAPI

mod poller;
mod system;

pub use poller::*;
pub use system::*;
