//! Integration tests

pub mod changeset_test;
pub mod engine_test;
pub mod pad_test;
pub mod ratelimit_test;
pub mod routes_test;
