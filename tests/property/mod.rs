//! Property-based tests

pub mod changeset_proptest;
pub mod pool_proptest;
pub mod store_proptest;
