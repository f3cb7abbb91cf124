//! Test utilities for snapcoord integration tests
//!
//! - TestFixture: isolated engine, registry and database path per test
//! - RecordingQuery: async query double that records what the coordinator
//!   asked of it
//! - CountingContext: binding context that counts callbacks

#![allow(dead_code)]

pub mod recording_query;
pub mod test_fixture;

pub use recording_query::RecordingQuery;
pub use test_fixture::{init_logging, set_int, v, CountingContext, TestFixture};
